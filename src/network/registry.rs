//! Listen-socket registry
//!
//! All listen sockets live in a `NetworkContext`, keyed by an opaque
//! `SocketHandle`. Multiple sockets can coexist; there is no global state,
//! and operations on a closed handle fail with `InvalidHandle`.

use std::collections::HashMap;
use std::net::SocketAddr;

use super::connection::ConnectionState;
use super::error::{invalid_socket_handle, NetworkResult};
use super::protocol::DisconnectReason;
use super::socket::{ListenSocket, Messages, SocketConfig};
use crate::error::EngineResult;

/// Opaque identifier for a listen socket owned by a [`NetworkContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(u32);

/// Owner of every listen socket in the process.
///
/// Poll-driven: nothing happens between calls to [`poll`](Self::poll) /
/// [`poll_all`](Self::poll_all).
pub struct NetworkContext {
    sockets: HashMap<SocketHandle, ListenSocket>,
    next_handle: u32,
}

impl NetworkContext {
    pub fn new() -> Self {
        Self {
            sockets: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Bind a new listen socket and register it.
    pub fn create_listen_socket(&mut self, config: &SocketConfig) -> EngineResult<SocketHandle> {
        let socket = ListenSocket::bind(config)?;
        let handle = SocketHandle(self.next_handle);
        self.next_handle += 1;
        log::info!(
            "[NetworkContext] listen socket {:?} bound to {}",
            handle,
            socket.local_addr()
        );
        self.sockets.insert(handle, socket);
        Ok(handle)
    }

    /// Close a socket, notifying every live peer with `ServerClosed`.
    pub fn close_listen_socket(&mut self, handle: SocketHandle) -> NetworkResult<()> {
        let mut socket = self
            .sockets
            .remove(&handle)
            .ok_or_else(invalid_socket_handle)?;
        socket.close_all(DisconnectReason::ServerClosed);
        log::info!("[NetworkContext] closed listen socket {:?}", handle);
        Ok(())
    }

    /// Accept pending peers and pump connections on one socket.
    pub fn poll(&mut self, handle: SocketHandle) -> NetworkResult<()> {
        self.socket_mut(handle)?.poll();
        Ok(())
    }

    /// Poll every registered socket.
    pub fn poll_all(&mut self) {
        for socket in self.sockets.values_mut() {
            socket.poll();
        }
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn local_addr(&self, handle: SocketHandle) -> NetworkResult<SocketAddr> {
        Ok(self.socket(handle)?.local_addr())
    }

    pub fn connection_count(&self, handle: SocketHandle) -> NetworkResult<usize> {
        Ok(self.socket(handle)?.connection_count())
    }

    pub fn connection_state(
        &self,
        handle: SocketHandle,
        slot: usize,
    ) -> NetworkResult<ConnectionState> {
        self.socket(handle)?.connection_state(slot)
    }

    pub fn send_message(
        &mut self,
        handle: SocketHandle,
        slot: usize,
        data: &[u8],
    ) -> NetworkResult<()> {
        self.socket_mut(handle)?.send_message(slot, data)
    }

    /// One-shot iterator draining messages from every slot of one socket.
    pub fn drain_messages(&mut self, handle: SocketHandle) -> NetworkResult<Messages<'_>> {
        Ok(self.socket_mut(handle)?.drain_messages())
    }

    /// Pop one message from a specific connection slot.
    pub fn take_message(
        &mut self,
        handle: SocketHandle,
        slot: usize,
    ) -> NetworkResult<Option<Vec<u8>>> {
        self.socket_mut(handle)?.take_message(slot)
    }

    pub fn close_connection(
        &mut self,
        handle: SocketHandle,
        slot: usize,
        reason: DisconnectReason,
    ) -> NetworkResult<()> {
        self.socket_mut(handle)?.close_connection(slot, reason)
    }

    fn socket(&self, handle: SocketHandle) -> NetworkResult<&ListenSocket> {
        self.sockets.get(&handle).ok_or_else(invalid_socket_handle)
    }

    fn socket_mut(&mut self, handle: SocketHandle) -> NetworkResult<&mut ListenSocket> {
        self.sockets
            .get_mut(&handle)
            .ok_or_else(invalid_socket_handle)
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_stay_unique_across_close_and_recreate() {
        let mut context = NetworkContext::new();
        let config = SocketConfig {
            port: 0,
            capacity: 4,
        };

        let a = context.create_listen_socket(&config).unwrap();
        let b = context.create_listen_socket(&config).unwrap();
        assert_ne!(a, b);
        assert_eq!(context.socket_count(), 2);

        context.close_listen_socket(a).unwrap();
        let c = context.create_listen_socket(&config).unwrap();
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut context = NetworkContext::new();
        let handle = context
            .create_listen_socket(&SocketConfig {
                port: 0,
                capacity: 4,
            })
            .unwrap();
        context.close_listen_socket(handle).unwrap();

        assert!(context.poll(handle).is_err());
        assert!(context.connection_count(handle).is_err());
        assert!(context.close_listen_socket(handle).is_err());
    }
}

//! Listen socket with a bounded, recycling connection-slot array
//!
//! Each socket holds up to `capacity` connections in stable integer slots.
//! Freed slots go through a FIFO free-list, so a reconnecting peer reuses
//! the oldest reclaimed index. Accepts beyond capacity are rejected
//! immediately with a `ServerFull` close reason.

use std::collections::VecDeque;
use std::io::{ErrorKind, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};

use serde::{Deserialize, Serialize};

use super::connection::{Connection, ConnectionState};
use super::error::{connection_not_live, NetworkResult};
use super::protocol::{self, DisconnectReason, DEFAULT_PORT, MAX_CONNECTIONS};

/// Listen socket construction parameters.
///
/// `capacity` is clamped to the fixed slot-array bound of
/// [`MAX_CONNECTIONS`]. Port 0 binds an ephemeral port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SocketConfig {
    pub port: u16,
    pub capacity: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            capacity: MAX_CONNECTIONS,
        }
    }
}

/// A message received from a connection slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub slot: usize,
    pub payload: Vec<u8>,
}

/// Server-side endpoint accepting inbound peer connections.
pub struct ListenSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    slots: Vec<Option<Connection>>,
    free_slots: VecDeque<usize>,
    capacity: usize,
}

impl ListenSocket {
    pub(crate) fn bind(config: &SocketConfig) -> NetworkResult<Self> {
        let capacity = config.capacity.clamp(1, MAX_CONNECTIONS);
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        log::debug!("[ListenSocket] listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            slots: Vec::new(),
            free_slots: VecDeque::new(),
            capacity,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn connection_state(&self, slot: usize) -> NetworkResult<ConnectionState> {
        self.connection(slot).map(Connection::state)
    }

    pub fn remote_addr(&self, slot: usize) -> NetworkResult<SocketAddr> {
        self.connection(slot).map(Connection::remote_addr)
    }

    /// Accept pending peers, pump established connections, and reclaim
    /// slots whose peers went away.
    pub(crate) fn poll(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("[ListenSocket] accept failed: {}", e);
                    break;
                }
            }
        }

        for slot in 0..self.slots.len() {
            let closed = match &mut self.slots[slot] {
                Some(connection) => {
                    connection.pump();
                    connection.state() == ConnectionState::Closed
                }
                None => false,
            };
            if closed {
                self.recycle(slot);
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.connection_count() >= self.capacity {
            log::warn!(
                "[ListenSocket] rejecting {}: server full ({} slots)",
                addr,
                self.capacity
            );
            reject(stream, DisconnectReason::ServerFull);
            return;
        }

        let mut connection = match Connection::new(stream, addr) {
            Ok(connection) => connection,
            Err(e) => {
                log::warn!("[ListenSocket] failed to set up {}: {}", addr, e);
                return;
            }
        };
        connection.mark_accepted();

        let slot = self.free_slots.pop_front().unwrap_or_else(|| {
            self.slots.push(None);
            self.slots.len() - 1
        });
        log::debug!("[ListenSocket] accepted {} into slot {}", addr, slot);
        self.slots[slot] = Some(connection);
    }

    fn recycle(&mut self, slot: usize) {
        if self.slots[slot].take().is_some() {
            log::debug!("[ListenSocket] reclaimed slot {}", slot);
            self.free_slots.push_back(slot);
        }
    }

    pub(crate) fn send_message(&mut self, slot: usize, data: &[u8]) -> NetworkResult<()> {
        match self.slots.get_mut(slot).and_then(Option::as_mut) {
            Some(connection) => connection.send_payload(data),
            None => Err(connection_not_live(slot)),
        }
    }

    /// One-shot iterator draining received messages across every slot.
    pub(crate) fn drain_messages(&mut self) -> Messages<'_> {
        Messages {
            slots: &mut self.slots,
            cursor: 0,
        }
    }

    /// Pop one message from a specific slot.
    pub(crate) fn take_message(&mut self, slot: usize) -> NetworkResult<Option<Vec<u8>>> {
        match self.slots.get_mut(slot).and_then(Option::as_mut) {
            Some(connection) => Ok(connection.take_message()),
            None => Err(connection_not_live(slot)),
        }
    }

    pub(crate) fn close_connection(
        &mut self,
        slot: usize,
        reason: DisconnectReason,
    ) -> NetworkResult<()> {
        match self.slots.get_mut(slot).and_then(Option::as_mut) {
            Some(connection) => {
                connection.close(reason);
                self.recycle(slot);
                Ok(())
            }
            None => Err(connection_not_live(slot)),
        }
    }

    pub(crate) fn close_all(&mut self, reason: DisconnectReason) {
        for slot in 0..self.slots.len() {
            if let Some(connection) = self.slots[slot].as_mut() {
                connection.close(reason);
                self.recycle(slot);
            }
        }
    }

    fn connection(&self, slot: usize) -> NetworkResult<&Connection> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| connection_not_live(slot))
    }
}

/// Best-effort close notification for a peer that never got a slot. The
/// stream is still in blocking mode here, so the frame goes out whole.
fn reject(mut stream: TcpStream, reason: DisconnectReason) {
    let _ = stream.write_all(&protocol::encode_close(reason));
    let _ = stream.shutdown(Shutdown::Both);
}

/// One-shot, non-restartable iterator over received messages.
pub struct Messages<'a> {
    slots: &'a mut Vec<Option<Connection>>,
    cursor: usize,
}

impl<'a> Iterator for Messages<'a> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        while self.cursor < self.slots.len() {
            if let Some(connection) = self.slots[self.cursor].as_mut() {
                if let Some(payload) = connection.take_message() {
                    return Some(Message {
                        slot: self.cursor,
                        payload,
                    });
                }
            }
            self.cursor += 1;
        }
        None
    }
}

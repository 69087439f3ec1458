//! Outbound client connection

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use super::connection::{Connection, ConnectionState};
use super::error::NetworkResult;
use super::protocol::DisconnectReason;

/// Client side of a framed connection.
pub struct ClientConnection {
    connection: Connection,
}

impl ClientConnection {
    /// Connect to a listen socket. The connect itself is blocking; the
    /// established connection is non-blocking and poll-driven.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> NetworkResult<Self> {
        let stream = TcpStream::connect(addr)?;
        let remote_addr = stream.peer_addr()?;
        let mut connection = Connection::new(stream, remote_addr)?;
        connection.mark_accepted();
        log::debug!("[ClientConnection] connected to {}", remote_addr);
        Ok(Self { connection })
    }

    /// Read everything the server has sent since the last poll.
    pub fn poll(&mut self) {
        self.connection.pump();
    }

    pub fn send(&mut self, data: &[u8]) -> NetworkResult<()> {
        self.connection.send_payload(data)
    }

    /// Pop one received message, oldest first.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        self.connection.take_message()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Why the server closed the connection, when it said so.
    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.connection.close_reason()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_addr()
    }

    pub fn close(&mut self) {
        self.connection.close(DisconnectReason::ClientDisconnect);
    }
}

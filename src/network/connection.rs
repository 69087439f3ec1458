//! A single framed connection over non-blocking TCP

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use super::error::NetworkResult;
use super::protocol::{self, DisconnectReason, Frame};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Accepted,
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// One peer connection (either side of the link).
pub struct Connection {
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: ConnectionState,
    recv_buffer: Vec<u8>,
    inbox: VecDeque<Vec<u8>>,
    close_reason: Option<DisconnectReason>,
    stats: ConnectionStats,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, remote_addr: SocketAddr) -> std::io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            remote_addr,
            state: ConnectionState::Connecting,
            recv_buffer: Vec::with_capacity(8192),
            inbox: VecDeque::new(),
            close_reason: None,
            stats: ConnectionStats::default(),
        })
    }

    pub(crate) fn mark_accepted(&mut self) {
        self.state = ConnectionState::Accepted;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Why the connection closed, when the reason is known.
    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.close_reason
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send one payload frame.
    pub(crate) fn send_payload(&mut self, data: &[u8]) -> NetworkResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(std::io::Error::from(ErrorKind::NotConnected).into());
        }
        let frame = protocol::encode_payload(data)?;
        self.stream.write_all(&frame)?;
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        Ok(())
    }

    /// Read everything available and split it into frames.
    pub(crate) fn pump(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    // Peer hung up without a close frame.
                    self.state = ConnectionState::Closed;
                    break;
                }
                Ok(n) => {
                    self.recv_buffer.extend_from_slice(&chunk[..n]);
                    self.stats.bytes_received += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("[Connection] {} read failed: {}", self.remote_addr, e);
                    self.state = ConnectionState::Closed;
                    break;
                }
            }
        }

        loop {
            match protocol::try_parse_frame(&mut self.recv_buffer) {
                Ok(Some(Frame::Payload(payload))) => {
                    self.stats.messages_received += 1;
                    self.inbox.push_back(payload);
                }
                Ok(Some(Frame::Close(reason))) => {
                    self.close_reason = reason;
                    self.state = ConnectionState::Closed;
                    break;
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("[Connection] {} dropped: {}", self.remote_addr, e);
                    self.state = ConnectionState::Closed;
                    break;
                }
            }
        }
    }

    /// Pop one received payload, oldest first.
    pub(crate) fn take_message(&mut self) -> Option<Vec<u8>> {
        self.inbox.pop_front()
    }

    /// Close the connection, telling the peer why.
    pub(crate) fn close(&mut self, reason: DisconnectReason) {
        if self.state == ConnectionState::Closed {
            return;
        }
        let _ = self.stream.write_all(&protocol::encode_close(reason));
        let _ = self.stream.shutdown(Shutdown::Both);
        self.state = ConnectionState::Closed;
        self.close_reason = Some(reason);
    }
}

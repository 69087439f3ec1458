//! Wire protocol constants and message framing
//!
//! Frames are length-prefixed over TCP: a 4-byte big-endian body length,
//! one kind byte, then the body. Payload frames carry application bytes;
//! close frames carry a 2-byte disconnect reason.

use serde::{Deserialize, Serialize};

use super::error::message_too_large;
use crate::error::EngineResult;

/// Connection slots per listen socket
pub const MAX_CONNECTIONS: usize = 256;

/// Default listen port
pub const DEFAULT_PORT: u16 = 27015;

/// Largest accepted frame body
pub const MAX_MESSAGE_SIZE: usize = 65536;

pub(crate) const FRAME_HEADER_SIZE: usize = 5;

const KIND_PAYLOAD: u8 = 0;
const KIND_CLOSE: u8 = 1;

/// Why a connection was closed.
///
/// The numeric values are the wire contract and are mirrored one-for-one
/// by peers; keep them in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    ClientDisconnect = 1001,
    ServerClosed = 1002,
    ServerReject = 1003,
    ServerFull = 1004,
    ClientKicked = 1005,
}

impl DisconnectReason {
    pub fn to_wire(self) -> u16 {
        self as u16
    }

    pub fn from_wire(code: u16) -> Option<Self> {
        match code {
            1001 => Some(Self::ClientDisconnect),
            1002 => Some(Self::ServerClosed),
            1003 => Some(Self::ServerReject),
            1004 => Some(Self::ServerFull),
            1005 => Some(Self::ClientKicked),
            _ => None,
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Payload(Vec<u8>),
    /// `None` when the peer sent a reason code this build does not know.
    Close(Option<DisconnectReason>),
}

pub(crate) fn encode_payload(data: &[u8]) -> EngineResult<Vec<u8>> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(message_too_large(data.len()));
    }
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.push(KIND_PAYLOAD);
    frame.extend_from_slice(data);
    Ok(frame)
}

pub(crate) fn encode_close(reason: DisconnectReason) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + 2);
    frame.extend_from_slice(&2u32.to_be_bytes());
    frame.push(KIND_CLOSE);
    frame.extend_from_slice(&reason.to_wire().to_be_bytes());
    frame
}

/// Pop one complete frame off the front of `buffer`, if present.
///
/// Returns an error for oversize or malformed frames; the caller is
/// expected to drop the connection in that case.
pub(crate) fn try_parse_frame(buffer: &mut Vec<u8>) -> EngineResult<Option<Frame>> {
    if buffer.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(message_too_large(len));
    }
    if buffer.len() < FRAME_HEADER_SIZE + len {
        return Ok(None);
    }

    let kind = buffer[4];
    let body: Vec<u8> = buffer[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len].to_vec();
    buffer.drain(..FRAME_HEADER_SIZE + len);

    match kind {
        KIND_CLOSE if body.len() >= 2 => {
            let code = u16::from_be_bytes([body[0], body[1]]);
            Ok(Some(Frame::Close(DisconnectReason::from_wire(code))))
        }
        KIND_CLOSE => Ok(Some(Frame::Close(None))),
        _ => Ok(Some(Frame::Payload(body))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_frame_round_trip() {
        let mut buffer = encode_payload(b"hello").unwrap();
        let frame = try_parse_frame(&mut buffer).unwrap().unwrap();
        assert_eq!(frame, Frame::Payload(b"hello".to_vec()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn close_frame_round_trip() {
        let mut buffer = encode_close(DisconnectReason::ServerFull);
        let frame = try_parse_frame(&mut buffer).unwrap().unwrap();
        assert_eq!(frame, Frame::Close(Some(DisconnectReason::ServerFull)));
    }

    #[test]
    fn partial_frames_wait_for_more_data() {
        let full = encode_payload(b"split").unwrap();
        let mut buffer = full[..3].to_vec();
        assert_eq!(try_parse_frame(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(&full[3..]);
        assert_eq!(
            try_parse_frame(&mut buffer).unwrap(),
            Some(Frame::Payload(b"split".to_vec()))
        );
    }

    #[test]
    fn oversize_frames_are_rejected() {
        assert!(encode_payload(&vec![0u8; MAX_MESSAGE_SIZE + 1]).is_err());

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&((MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes()));
        buffer.push(0);
        assert!(try_parse_frame(&mut buffer).is_err());
    }

    #[test]
    fn unknown_close_codes_decode_without_a_reason() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&2u32.to_be_bytes());
        frame.push(1);
        frame.extend_from_slice(&9999u16.to_be_bytes());
        assert_eq!(
            try_parse_frame(&mut frame).unwrap(),
            Some(Frame::Close(None))
        );
    }

    #[test]
    fn disconnect_reasons_keep_their_wire_values() {
        assert_eq!(DisconnectReason::ClientDisconnect.to_wire(), 1001);
        assert_eq!(DisconnectReason::ClientKicked.to_wire(), 1005);
        assert_eq!(
            DisconnectReason::from_wire(1004),
            Some(DisconnectReason::ServerFull)
        );
        assert_eq!(DisconnectReason::from_wire(42), None);
    }
}

//! Wire format for neighbor calls
//!
//! Every frame is a 4-byte big-endian body length followed by a `bincode`
//! body. A call is one connection: the client writes its request frame(s),
//! the server answers with at most one [`ServerFrame`]. A server that
//! withholds its reply closes the connection without writing anything.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::WireError;
use crate::protocol::message::{
    GreetRequest, HeartbeatRequest, Method, NarrateRequest, Reply, TellRequest,
};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Size of the length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest accepted frame body (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

// ----------------------------------------------------------------------------
// Frames
// ----------------------------------------------------------------------------

/// Frames written by the calling side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientFrame {
    Heartbeat(HeartbeatRequest),
    Greet(GreetRequest),
    Tell(TellRequest),
    /// One item of a Narrate stream
    NarrateChunk(NarrateRequest),
    /// Closes a Narrate stream
    NarrateEnd,
}

impl ClientFrame {
    pub fn method(&self) -> Method {
        match self {
            ClientFrame::Heartbeat(_) => Method::Heartbeat,
            ClientFrame::Greet(_) => Method::Greet,
            ClientFrame::Tell(_) => Method::Tell,
            ClientFrame::NarrateChunk(_) | ClientFrame::NarrateEnd => Method::Narrate,
        }
    }
}

/// Frames written by the serving side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerFrame {
    Reply(Reply),
    Unimplemented(Method),
}

// ----------------------------------------------------------------------------
// Wire Format Codec
// ----------------------------------------------------------------------------

/// Length-prefixed frame encoder/decoder
pub struct WireFormat;

impl WireFormat {
    /// Encode a frame including its length prefix
    pub fn encode<T: Serialize>(frame: &T) -> Result<Vec<u8>, WireError> {
        let body = bincode::serialize(frame)?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge {
                max: MAX_FRAME_SIZE,
                actual: body.len(),
            });
        }

        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Read the body length out of a frame header
    pub fn body_len(header: [u8; FRAME_HEADER_SIZE]) -> Result<usize, WireError> {
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge {
                max: MAX_FRAME_SIZE,
                actual: len,
            });
        }
        Ok(len)
    }

    /// Decode a frame body (without its length prefix)
    pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
        Ok(bincode::deserialize(body)?)
    }

    /// Decode one complete frame from the front of `bytes`
    ///
    /// Returns the frame and the number of bytes it occupied.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), WireError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(WireError::Truncated {
                expected: FRAME_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&bytes[..FRAME_HEADER_SIZE]);
        let len = Self::body_len(header)?;

        let end = FRAME_HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(WireError::Truncated {
                expected: end,
                actual: bytes.len(),
            });
        }
        let frame = Self::decode_body(&bytes[FRAME_HEADER_SIZE..end])?;
        Ok((frame, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::TellReply;
    use crate::types::{SequenceNumber, Timestamp};

    #[test]
    fn test_narrate_stream_back_to_back() {
        let chunk = ClientFrame::NarrateChunk(NarrateRequest {
            identity: "dummy".to_string(),
            message: "once upon a time".to_string(),
            sequence: SequenceNumber::new(3),
            timestamp: Timestamp::new(1_700_000_000_000),
        });

        let mut buffer = WireFormat::encode(&chunk).unwrap();
        buffer.extend(WireFormat::encode(&ClientFrame::NarrateEnd).unwrap());

        let (first, used): (ClientFrame, usize) = WireFormat::decode(&buffer).unwrap();
        assert_eq!(first, chunk);
        let (second, rest): (ClientFrame, usize) = WireFormat::decode(&buffer[used..]).unwrap();
        assert_eq!(second, ClientFrame::NarrateEnd);
        assert_eq!(used + rest, buffer.len());
    }

    #[test]
    fn test_truncated_frame() {
        let frame = ServerFrame::Reply(Reply::Tell(TellReply {
            identity: "dummy".to_string(),
        }));
        let bytes = WireFormat::encode(&frame).unwrap();

        let result: Result<(ServerFrame, usize), _> = WireFormat::decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(WireError::Truncated { .. })));

        let result: Result<(ServerFrame, usize), _> = WireFormat::decode(&bytes[..2]);
        assert!(matches!(
            result,
            Err(WireError::Truncated {
                expected: FRAME_HEADER_SIZE,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        assert!(matches!(
            WireFormat::body_len(header),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_frame_methods() {
        assert_eq!(ClientFrame::NarrateEnd.method(), Method::Narrate);
        let heartbeat = ClientFrame::Heartbeat(HeartbeatRequest {
            identity: "dummy".to_string(),
        });
        assert_eq!(heartbeat.method(), Method::Heartbeat);
    }
}

//! Tokio codec for the CM TCP framing.
//!
//! Each frame is `[u32 LE length][u32 LE magic][length bytes]`. The codec
//! only frames; encryption of the payload is layered on top by the
//! transport.

use crate::config::{MAX_PAYLOAD_SIZE, TCP_CONNECTION_MAGIC};
use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the length and magic prefix.
pub const FRAME_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        let magic = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);

        // check magic before trusting the length
        if magic != TCP_CONNECTION_MAGIC {
            return Err(ProtocolError::InvalidMagic {
                expected: TCP_CONNECTION_MAGIC,
                actual: magic,
            });
        }

        if len > self.max_payload {
            return Err(ProtocolError::OversizedPacket(len));
        }

        if src.len() < FRAME_HEADER_LEN + len {
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }

        dst.reserve(FRAME_HEADER_LEN + payload.len());
        dst.put_u32_le(payload.len() as u32);
        dst.put_u32_le(TCP_CONNECTION_MAGIC);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

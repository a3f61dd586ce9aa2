//! # Binary Serialization
//!
//! Little-endian primitives shared by message headers and struct bodies.
//!
//! Struct-shaped messages carry hand-laid-out fields rather than a
//! self-describing format, so every header and body implements
//! [`Serializable`] directly against `bytes` buffers. Reads go through
//! [`WireRead`], which turns a short buffer into a `DecodeError` instead of
//! the panic `bytes::Buf` would raise.
//!
//! ## Usage
//! ```rust
//! use bytes::{Bytes, BytesMut};
//! use steam_protocol::core::serialization::{Serializable, WireRead};
//! use steam_protocol::protocol::messages::MsgChannelEncryptResult;
//! use steam_protocol::protocol::emsg::EResult;
//!
//! let mut out = BytesMut::new();
//! MsgChannelEncryptResult { result: EResult::OK }.serialize(&mut out);
//! let mut input = out.freeze();
//! let decoded = MsgChannelEncryptResult::deserialize(&mut input).unwrap();
//! assert_eq!(decoded.result, EResult::OK);
//! ```

use crate::error::{ProtocolError, Result};
use bytes::{Buf, Bytes, BytesMut};

/// A value with a fixed binary layout on the wire.
pub trait Serializable: Sized {
    /// Appends the binary form of `self` to `out`.
    fn serialize(&self, out: &mut BytesMut);

    /// Reads a value from the front of `input`, advancing it past the bytes consumed.
    fn deserialize(input: &mut Bytes) -> Result<Self>;
}

/// Bounds-checked little-endian reads.
pub trait WireRead {
    fn read_u8(&mut self) -> Result<u8>;
    fn read_u16_le(&mut self) -> Result<u16>;
    fn read_u32_le(&mut self) -> Result<u32>;
    fn read_i32_le(&mut self) -> Result<i32>;
    fn read_u64_le(&mut self) -> Result<u64>;
    fn read_bytes(&mut self, len: usize) -> Result<Bytes>;
}

#[inline]
fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::DecodeError(format!(
            "need {needed} bytes, {} remaining",
            buf.remaining()
        )));
    }
    Ok(())
}

impl WireRead for Bytes {
    fn read_u8(&mut self) -> Result<u8> {
        ensure(self, 1)?;
        Ok(self.get_u8())
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        ensure(self, 2)?;
        Ok(self.get_u16_le())
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        ensure(self, 4)?;
        Ok(self.get_u32_le())
    }

    fn read_i32_le(&mut self) -> Result<i32> {
        ensure(self, 4)?;
        Ok(self.get_i32_le())
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        ensure(self, 8)?;
        Ok(self.get_u64_le())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        ensure(self, len)?;
        Ok(self.split_to(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reads_are_errors() {
        let mut buf = Bytes::from_static(&[1, 2, 3]);
        assert!(matches!(buf.read_u32_le(), Err(ProtocolError::DecodeError(_))));
        // a failed read leaves the buffer untouched
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read_u16_le().unwrap(), 0x0201);
        assert_eq!(buf.read_u8().unwrap(), 3);
        assert!(buf.read_u8().is_err());
    }

    #[test]
    fn test_read_bytes_splits_front() {
        let mut buf = Bytes::from_static(b"headbody");
        let head = buf.read_bytes(4).unwrap();
        assert_eq!(&head[..], b"head");
        assert_eq!(&buf[..], b"body");
    }
}

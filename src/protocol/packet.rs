//! # Inbound Packets
//!
//! A [`Packet`] is a decrypted frame whose header has been classified and
//! parsed; the body stays undecoded until a handler asks for it with the
//! reader matching the header shape.
//!
//! ## Classification
//! 1. Read the raw type tag (`u32`, little-endian).
//! 2. `ChannelEncryptRequest` and `ChannelEncryptResult` always use the
//!    struct header, whatever the protobuf bit says.
//! 3. Otherwise the protobuf bit selects the protobuf header; its absence
//!    selects the extended client header.
//!
//! ## Usage
//! ```rust
//! use bytes::Bytes;
//! use steam_protocol::protocol::emsg::{EMsg, EResult};
//! use steam_protocol::protocol::message::{Message, StructMessage};
//! use steam_protocol::protocol::messages::MsgChannelEncryptResult;
//! use steam_protocol::protocol::packet::Packet;
//!
//! let wire = StructMessage::new(MsgChannelEncryptResult { result: EResult::OK }, Bytes::new()).to_bytes();
//! let packet = Packet::new(wire).unwrap();
//! assert_eq!(packet.emsg(), EMsg::ChannelEncryptResult);
//! let msg = packet.read_struct::<MsgChannelEncryptResult>().unwrap();
//! assert_eq!(msg.body.result, EResult::OK);
//! ```

use crate::core::serialization::Serializable;
use crate::error::{ProtocolError, Result};
use crate::protocol::emsg::{self, EMsg};
use crate::protocol::header::{ClientHeader, Header, MessageHeader, ProtoHeader, StructHeader};
use crate::protocol::job::JobId;
use crate::protocol::message::{ClientStructMessage, MessageBody, ProtoMessage, StructMessage};
use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Packet {
    header: Header,
    payload: Bytes,
    data: Bytes,
}

impl Packet {
    /// Classifies and parses the header at the front of `data`.
    ///
    /// # Errors
    /// Returns `DecodeError` (or a protobuf error) when the buffer is too
    /// short for the selected header shape.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        if data.len() < 4 {
            return Err(ProtocolError::DecodeError(format!(
                "packet of {} bytes has no type tag",
                data.len()
            )));
        }

        let raw = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let kind = emsg::mask(raw);

        let mut cursor = data.clone();
        let header = match kind {
            EMsg::ChannelEncryptRequest | EMsg::ChannelEncryptResult => {
                Header::Struct(StructHeader::deserialize(&mut cursor)?)
            }
            _ if emsg::is_proto(raw) => Header::Proto(ProtoHeader::deserialize(&mut cursor)?),
            _ => Header::Client(ClientHeader::deserialize(&mut cursor)?),
        };

        Ok(Self {
            header,
            payload: cursor,
            data,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn emsg(&self) -> EMsg {
        self.header.emsg()
    }

    pub fn is_proto(&self) -> bool {
        self.header.is_proto()
    }

    pub fn source_job(&self) -> JobId {
        self.header.source_job()
    }

    pub fn target_job(&self) -> JobId {
        self.header.target_job()
    }

    /// Bytes after the header.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The whole packet, header included.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn wrong_shape(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::WrongHeaderShape {
            emsg: self.emsg(),
            expected,
        }
    }

    /// Reads a struct body from a packet with the plain struct header.
    pub fn read_struct<T: MessageBody>(&self) -> Result<StructMessage<T>> {
        let Header::Struct(header) = &self.header else {
            return Err(self.wrong_shape("struct"));
        };
        let mut input = self.payload.clone();
        let body = T::deserialize(&mut input)?;
        Ok(StructMessage {
            header: header.clone(),
            body,
            payload: input,
        })
    }

    /// Reads a struct body from a packet with the extended client header.
    pub fn read_client_struct<T: MessageBody>(&self) -> Result<ClientStructMessage<T>> {
        let Header::Client(header) = &self.header else {
            return Err(self.wrong_shape("client struct"));
        };
        let mut input = self.payload.clone();
        let body = T::deserialize(&mut input)?;
        Ok(ClientStructMessage {
            header: header.clone(),
            body,
            payload: input,
        })
    }

    /// Decodes the protobuf body of a packet with the protobuf header.
    pub fn read_proto<T: prost::Message + Default>(&self) -> Result<ProtoMessage<T>> {
        let Header::Proto(header) = &self.header else {
            return Err(self.wrong_shape("protobuf"));
        };
        let body = T::decode(self.payload.clone())?;
        Ok(ProtoMessage {
            header: header.clone(),
            body,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet{{emsg={}, proto={}, len={}, target_job={}, source_job={}}}",
            self.emsg(),
            self.is_proto(),
            self.data.len(),
            self.target_job(),
            self.source_job()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::emsg::{EResult, EUniverse};
    use crate::protocol::message::Message;
    use crate::protocol::messages::{MsgChannelEncryptRequest, MsgClientLoggedOff};
    use crate::protocol::proto::CMsgClientLoggedOff;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_encrypt_request_ignores_forged_proto_bit() {
        let mut wire = BytesMut::new();
        wire.put_u32_le(emsg::with_proto(EMsg::ChannelEncryptRequest));
        wire.put_u64_le(u64::MAX);
        wire.put_u64_le(u64::MAX);
        wire.put_u32_le(1);
        wire.put_u32_le(1);

        let packet = Packet::new(wire.freeze()).unwrap();
        assert!(matches!(packet.header(), Header::Struct(_)));
        assert!(!packet.is_proto());
        let msg = packet.read_struct::<MsgChannelEncryptRequest>().unwrap();
        assert_eq!(msg.body.universe, EUniverse::Public);
    }

    #[test]
    fn test_client_struct_trailing_payload() {
        let wire = ClientStructMessage::new(
            MsgClientLoggedOff {
                result: EResult::LoggedInElsewhere,
                sec_min_reconnect_hint: 1,
                sec_max_reconnect_hint: 2,
            },
            Bytes::from_static(b"tail"),
        )
        .to_bytes();

        let packet = Packet::new(wire).unwrap();
        assert!(matches!(packet.header(), Header::Client(_)));
        let msg = packet.read_client_struct::<MsgClientLoggedOff>().unwrap();
        assert_eq!(msg.body.result, EResult::LoggedInElsewhere);
        assert_eq!(&msg.payload[..], b"tail");
    }

    #[test]
    fn test_proto_packet_keeps_raw_data() {
        let wire = ProtoMessage::new(
            EMsg::ClientLoggedOff,
            CMsgClientLoggedOff { eresult: Some(6) },
        )
        .to_bytes();

        let packet = Packet::new(wire.clone()).unwrap();
        assert_eq!(packet.data(), &wire);
        let msg = packet.read_proto::<CMsgClientLoggedOff>().unwrap();
        assert_eq!(msg.body.eresult(), 6);
    }

    #[test]
    fn test_wrong_reader_is_rejected() {
        let wire = ProtoMessage::new(EMsg::ClientLoggedOff, CMsgClientLoggedOff::default()).to_bytes();
        let packet = Packet::new(wire).unwrap();
        assert!(matches!(
            packet.read_client_struct::<MsgClientLoggedOff>(),
            Err(ProtocolError::WrongHeaderShape { expected: "client struct", .. })
        ));
        assert!(packet.read_struct::<MsgChannelEncryptRequest>().is_err());
    }

    #[test]
    fn test_truncated_packets() {
        assert!(Packet::new(Bytes::from_static(&[1, 2])).is_err());
        // client header needs 36 bytes
        let mut wire = BytesMut::new();
        wire.put_u32_le(u32::from(EMsg::ClientLoggedOff));
        wire.put_bytes(0, 10);
        assert!(Packet::new(wire.freeze()).is_err());
    }
}

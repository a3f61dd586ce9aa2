//! Fixed-layout struct message bodies.

use crate::core::serialization::{Serializable, WireRead};
use crate::error::Result;
use crate::protocol::emsg::{EMsg, EResult, EUniverse};
use crate::protocol::message::MessageBody;
use crate::steamid::SteamId;
use bytes::{BufMut, Bytes, BytesMut};

/// Only protocol version of the channel encryption exchange.
pub const CHANNEL_ENCRYPT_PROTOCOL_VERSION: u32 = 1;

/// Size in bytes of the RSA-wrapped session key.
pub const ENCRYPTED_KEY_SIZE: u32 = 128;

/// First message of a session: the server advertises its universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgChannelEncryptRequest {
    pub protocol_version: u32,
    pub universe: EUniverse,
}

impl Default for MsgChannelEncryptRequest {
    fn default() -> Self {
        Self {
            protocol_version: CHANNEL_ENCRYPT_PROTOCOL_VERSION,
            universe: EUniverse::Public,
        }
    }
}

impl MessageBody for MsgChannelEncryptRequest {
    const EMSG: EMsg = EMsg::ChannelEncryptRequest;
}

impl Serializable for MsgChannelEncryptRequest {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.protocol_version);
        out.put_u32_le(self.universe as u32);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        let protocol_version = input.read_u32_le()?;
        // older servers omit the universe
        let universe = if input.len() >= 4 {
            EUniverse::from_u32(input.read_u32_le()?)
        } else {
            EUniverse::Public
        };
        Ok(Self {
            protocol_version,
            universe,
        })
    }
}

/// Client reply carrying the wrapped session key in its trailing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgChannelEncryptResponse {
    pub protocol_version: u32,
    pub key_size: u32,
}

impl Default for MsgChannelEncryptResponse {
    fn default() -> Self {
        Self {
            protocol_version: CHANNEL_ENCRYPT_PROTOCOL_VERSION,
            key_size: ENCRYPTED_KEY_SIZE,
        }
    }
}

impl MessageBody for MsgChannelEncryptResponse {
    const EMSG: EMsg = EMsg::ChannelEncryptResponse;
}

impl Serializable for MsgChannelEncryptResponse {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.protocol_version);
        out.put_u32_le(self.key_size);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        Ok(Self {
            protocol_version: input.read_u32_le()?,
            key_size: input.read_u32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgChannelEncryptResult {
    pub result: EResult,
}

impl Default for MsgChannelEncryptResult {
    fn default() -> Self {
        Self {
            result: EResult::Invalid,
        }
    }
}

impl MessageBody for MsgChannelEncryptResult {
    const EMSG: EMsg = EMsg::ChannelEncryptResult;
}

impl Serializable for MsgChannelEncryptResult {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.result.into());
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        Ok(Self {
            result: EResult::from(input.read_u32_le()?),
        })
    }
}

/// Struct form of the log-on response, sent by older servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgClientLogOnResponse {
    pub result: EResult,
    pub out_of_game_heartbeat_rate_sec: i32,
    pub in_game_heartbeat_rate_sec: i32,
    pub client_supplied_steam_id: SteamId,
    pub ip_public: u32,
    pub server_real_time: u32,
}

impl MessageBody for MsgClientLogOnResponse {
    const EMSG: EMsg = EMsg::ClientLogOnResponse;
}

impl Serializable for MsgClientLogOnResponse {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.result.into());
        out.put_i32_le(self.out_of_game_heartbeat_rate_sec);
        out.put_i32_le(self.in_game_heartbeat_rate_sec);
        out.put_u64_le(self.client_supplied_steam_id.as_u64());
        out.put_u32_le(self.ip_public);
        out.put_u32_le(self.server_real_time);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        Ok(Self {
            result: EResult::from(input.read_u32_le()?),
            out_of_game_heartbeat_rate_sec: input.read_i32_le()?,
            in_game_heartbeat_rate_sec: input.read_i32_le()?,
            client_supplied_steam_id: SteamId::from_u64(input.read_u64_le()?),
            ip_public: input.read_u32_le()?,
            server_real_time: input.read_u32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgClientLoggedOff {
    pub result: EResult,
    pub sec_min_reconnect_hint: i32,
    pub sec_max_reconnect_hint: i32,
}

impl MessageBody for MsgClientLoggedOff {
    const EMSG: EMsg = EMsg::ClientLoggedOff;
}

impl Serializable for MsgClientLoggedOff {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.result.into());
        out.put_i32_le(self.sec_min_reconnect_hint);
        out.put_i32_le(self.sec_max_reconnect_hint);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        Ok(Self {
            result: EResult::from(input.read_u32_le()?),
            sec_min_reconnect_hint: input.read_i32_le()?,
            sec_max_reconnect_hint: input.read_i32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgClientNewLoginKey {
    pub unique_id: u32,
    pub login_key: [u8; 20],
}

impl MessageBody for MsgClientNewLoginKey {
    const EMSG: EMsg = EMsg::ClientNewLoginKey;
}

impl Serializable for MsgClientNewLoginKey {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u32_le(self.unique_id);
        out.put_slice(&self.login_key);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        let unique_id = input.read_u32_le()?;
        let mut login_key = [0u8; 20];
        login_key.copy_from_slice(&input.read_bytes(20)?);
        Ok(Self {
            unique_id,
            login_key,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_request_without_universe() {
        let mut input = Bytes::from_static(&[1, 0, 0, 0]);
        let body = MsgChannelEncryptRequest::deserialize(&mut input).unwrap();
        assert_eq!(body.protocol_version, 1);
        assert_eq!(body.universe, EUniverse::Public);
    }

    #[test]
    fn test_encrypt_request_with_universe() {
        let mut out = BytesMut::new();
        MsgChannelEncryptRequest {
            protocol_version: 1,
            universe: EUniverse::Beta,
        }
        .serialize(&mut out);
        let mut input = out.freeze();
        assert_eq!(
            MsgChannelEncryptRequest::deserialize(&mut input)
                .unwrap()
                .universe,
            EUniverse::Beta
        );
    }

    #[test]
    fn test_logged_off_truncated() {
        let mut input = Bytes::from_static(&[5, 0, 0, 0, 1, 0]);
        assert!(MsgClientLoggedOff::deserialize(&mut input).is_err());
    }

    #[test]
    fn test_new_login_key_layout() {
        let body = MsgClientNewLoginKey {
            unique_id: 9,
            login_key: [0xAB; 20],
        };
        let mut out = BytesMut::new();
        body.serialize(&mut out);
        assert_eq!(out.len(), 24);
        let mut input = out.freeze();
        assert_eq!(MsgClientNewLoginKey::deserialize(&mut input).unwrap(), body);
    }
}

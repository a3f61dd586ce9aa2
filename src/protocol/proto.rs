//! Protobuf message bodies exchanged with the CM server.
//!
//! Only the fields this client reads or writes are declared; prost skips
//! unknown fields on decode, so the server may send more.

/// Envelope carried in front of every protobuf-encoded message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgProtoBufHeader {
    #[prost(fixed64, optional, tag = "1")]
    pub steamid: Option<u64>,
    #[prost(int32, optional, tag = "2")]
    pub client_sessionid: Option<i32>,
    #[prost(uint32, optional, tag = "3")]
    pub routing_appid: Option<u32>,
    #[prost(fixed64, optional, tag = "10", default = "18446744073709551615")]
    pub jobid_source: Option<u64>,
    #[prost(fixed64, optional, tag = "11", default = "18446744073709551615")]
    pub jobid_target: Option<u64>,
    #[prost(string, optional, tag = "12")]
    pub target_job_name: Option<String>,
    #[prost(int32, optional, tag = "13", default = "2")]
    pub eresult: Option<i32>,
    #[prost(string, optional, tag = "14")]
    pub error_message: Option<String>,
}

/// Batch of length-prefixed sub-messages, gzip-compressed when
/// `size_unzipped` is non-zero.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgMulti {
    #[prost(uint32, optional, tag = "1")]
    pub size_unzipped: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message_body: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientHeartBeat {
    #[prost(bool, optional, tag = "1")]
    pub send_reply: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientLogon {
    #[prost(uint32, optional, tag = "1")]
    pub protocol_version: Option<u32>,
    #[prost(string, optional, tag = "6")]
    pub client_language: Option<String>,
    #[prost(bool, optional, tag = "8")]
    pub should_remember_password: Option<bool>,
    #[prost(fixed64, optional, tag = "22")]
    pub client_supplied_steam_id: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "30")]
    pub machine_id: Option<Vec<u8>>,
    #[prost(string, optional, tag = "50")]
    pub account_name: Option<String>,
    #[prost(string, optional, tag = "51")]
    pub password: Option<String>,
    #[prost(string, optional, tag = "60")]
    pub login_key: Option<String>,
    #[prost(int32, optional, tag = "82", default = "2")]
    pub eresult_sentryfile: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "83")]
    pub sha_sentryfile: Option<Vec<u8>>,
    #[prost(string, optional, tag = "84")]
    pub auth_code: Option<String>,
    #[prost(string, optional, tag = "102")]
    pub two_factor_code: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientLogonResponse {
    #[prost(int32, optional, tag = "1", default = "2")]
    pub eresult: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub out_of_game_heartbeat_seconds: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub in_game_heartbeat_seconds: Option<i32>,
    #[prost(uint32, optional, tag = "6")]
    pub account_flags: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub cell_id: Option<u32>,
    #[prost(int32, optional, tag = "10", default = "2")]
    pub eresult_extended: Option<i32>,
    #[prost(string, optional, tag = "11")]
    pub webapi_authenticate_user_nonce: Option<String>,
    #[prost(fixed64, optional, tag = "20")]
    pub client_supplied_steamid: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientLogOff {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientLoggedOff {
    #[prost(int32, optional, tag = "1", default = "2")]
    pub eresult: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientNewLoginKey {
    #[prost(uint32, optional, tag = "1")]
    pub unique_id: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub login_key: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientNewLoginKeyAccepted {
    #[prost(uint32, optional, tag = "1")]
    pub unique_id: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientUpdateMachineAuth {
    #[prost(string, optional, tag = "1")]
    pub filename: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub offset: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub cubtowrite: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub bytes: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientUpdateMachineAuthResponse {
    #[prost(string, optional, tag = "1")]
    pub filename: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub eresult: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub filesize: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub sha_file: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "6")]
    pub offset: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub cubwrote: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientAccountInfo {
    #[prost(string, optional, tag = "1")]
    pub persona_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub ip_country: Option<String>,
    #[prost(int32, optional, tag = "5")]
    pub count_authed_computers: Option<i32>,
    #[prost(uint32, optional, tag = "7")]
    pub account_flags: Option<u32>,
}

/// Server list push. Addresses are IPv4 in host order, paired by index
/// with `cm_ports`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientCMList {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub cm_addresses: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub cm_ports: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgClientGamesPlayed {
    #[prost(message, repeated, tag = "1")]
    pub games_played: Vec<GamePlayed>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GamePlayed {
    #[prost(fixed64, optional, tag = "2")]
    pub game_id: Option<u64>,
}

/// Envelope tunnelling a Game Coordinator message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CMsgGCClient {
    #[prost(uint32, optional, tag = "1")]
    pub appid: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub msgtype: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub payload: Option<Vec<u8>>,
    #[prost(fixed64, optional, tag = "4")]
    pub steamid: Option<u64>,
    #[prost(string, optional, tag = "5")]
    pub gcname: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_header_job_defaults() {
        let header = CMsgProtoBufHeader::default();
        assert_eq!(header.jobid_source(), u64::MAX);
        assert_eq!(header.jobid_target(), u64::MAX);
        assert_eq!(header.eresult(), 2);
        assert!(header.encode_to_vec().is_empty());
    }

    #[test]
    fn test_logon_fields_survive_encoding() {
        let logon = CMsgClientLogon {
            account_name: Some("user".into()),
            password: Some("hunter2".into()),
            protocol_version: Some(65575),
            sha_sentryfile: Some(vec![1; 20]),
            ..Default::default()
        };
        let decoded = CMsgClientLogon::decode(&logon.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.account_name(), "user");
        assert_eq!(decoded.protocol_version(), 65575);
        assert_eq!(decoded.sha_sentryfile(), &[1u8; 20][..]);
        assert!(decoded.login_key.is_none());
    }
}

//! End-to-end session tests against a mock CM server on loopback.
//!
//! The mock server speaks the real framing, performs the channel handshake
//! with a freshly generated RSA key and then exchanges encrypted packets.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use std::time::Duration;
use steam_protocol::config::ClientConfig;
use steam_protocol::core::codec::FrameCodec;
use steam_protocol::error::ProtocolError;
use steam_protocol::protocol::emsg::{EMsg, EResult, EUniverse};
use steam_protocol::protocol::job::JobId;
use steam_protocol::protocol::message::{Message, ProtoMessage, StructMessage};
use steam_protocol::protocol::messages::{
    MsgChannelEncryptRequest, MsgChannelEncryptResponse, MsgChannelEncryptResult,
};
use steam_protocol::protocol::packet::Packet;
use steam_protocol::protocol::proto::{
    CMsgClientCMList, CMsgClientHeartBeat, CMsgClientLoggedOff, CMsgClientLogon, CMsgClientLogonResponse, CMsgMulti,
    CMsgClientNewLoginKey, CMsgClientNewLoginKeyAccepted, CMsgClientUpdateMachineAuth,
    CMsgClientUpdateMachineAuthResponse, CMsgProtoBufHeader,
};
use steam_protocol::service::client::EventStream;
use steam_protocol::service::machine_id::FallbackMachineId;
use steam_protocol::utils::compression::compress;
use steam_protocol::utils::crypto::{sha1, SessionCipher, UniverseKeys};
use steam_protocol::{Client, Event, LogOnDetails};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(10);

struct MockServer {
    framed: Framed<TcpStream, FrameCodec>,
    cipher: Option<SessionCipher>,
}

impl MockServer {
    async fn send_plain(&mut self, msg: &dyn Message) {
        self.framed.send(msg.to_bytes()).await.unwrap();
    }

    async fn send(&mut self, msg: &dyn Message) {
        let sealed = self.cipher.as_ref().unwrap().encrypt(&msg.to_bytes()).unwrap();
        self.framed.send(Bytes::from(sealed)).await.unwrap();
    }

    async fn send_raw(&mut self, payload: &[u8]) {
        let sealed = self.cipher.as_ref().unwrap().encrypt(payload).unwrap();
        self.framed.send(Bytes::from(sealed)).await.unwrap();
    }

    async fn recv_plain(&mut self) -> Packet {
        let frame = tokio::time::timeout(WAIT, self.framed.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .unwrap();
        Packet::new(frame.freeze()).unwrap()
    }

    async fn recv(&mut self) -> Packet {
        let frame = tokio::time::timeout(WAIT, self.framed.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .unwrap();
        let opened = self.cipher.as_ref().unwrap().decrypt(&frame).unwrap();
        Packet::new(opened).unwrap()
    }

    /// Runs the server side of the channel handshake.
    async fn handshake(&mut self, key: &RsaPrivateKey, universe: EUniverse) {
        self.send_plain(&StructMessage::new(
            MsgChannelEncryptRequest {
                protocol_version: 1,
                universe,
            },
            Bytes::new(),
        ))
        .await;

        let packet = self.recv_plain().await;
        assert_eq!(packet.emsg(), EMsg::ChannelEncryptResponse);
        let response = packet.read_struct::<MsgChannelEncryptResponse>().unwrap();
        assert_eq!(response.body.key_size, 128);
        assert_eq!(response.payload.len(), 128 + 8);
        assert_eq!(&response.payload[132..], &[0u8; 4]);

        let session_key = key
            .decrypt(Oaep::new::<Sha1>(), &response.payload[..128])
            .unwrap();
        assert_eq!(session_key.len(), 32);
        self.cipher = Some(SessionCipher::new(&session_key).unwrap());

        self.send_plain(&StructMessage::new(
            MsgChannelEncryptResult { result: EResult::OK },
            Bytes::new(),
        ))
        .await;
    }
}

struct Harness {
    client: Client,
    events: EventStream,
    server: MockServer,
    key: RsaPrivateKey,
}

async fn harness() -> Harness {
    let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
    let mut keys = UniverseKeys::empty();
    keys.insert(EUniverse::Public, key.to_public_key());

    let client = Client::builder(ClientConfig::default())
        .universe_keys(keys)
        .machine_id(FallbackMachineId)
        .build()
        .unwrap();
    let events = client.events().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted, connected) = tokio::join!(listener.accept(), client.connect_to(addr));
    connected.unwrap();
    let (stream, _) = accepted.unwrap();

    Harness {
        client,
        events,
        server: MockServer {
            framed: Framed::new(stream, FrameCodec::default()),
            cipher: None,
        },
        key,
    }
}

async fn next_event(events: &mut EventStream) -> Event {
    tokio::time::timeout(WAIT, events.next())
        .await
        .expect("event in time")
        .expect("event stream open")
}

/// Completes the handshake and consumes the `Connected` event.
async fn connected_harness() -> Harness {
    let mut h = harness().await;
    let key = h.key.clone();
    h.server.handshake(&key, EUniverse::Public).await;
    assert!(matches!(next_event(&mut h.events).await, Event::Connected));
    assert!(h.client.is_encrypted());
    h
}

fn logon_response(session_id: i32, steam_id: u64, heartbeat: i32) -> ProtoMessage<CMsgClientLogonResponse> {
    let mut msg = ProtoMessage::new(
        EMsg::ClientLogOnResponse,
        CMsgClientLogonResponse {
            eresult: Some(1),
            out_of_game_heartbeat_seconds: Some(heartbeat),
            webapi_authenticate_user_nonce: Some("nonce".into()),
            ..Default::default()
        },
    );
    msg.header.proto = CMsgProtoBufHeader {
        client_sessionid: Some(session_id),
        steamid: Some(steam_id),
        ..Default::default()
    };
    msg
}

#[tokio::test]
async fn test_handshake_then_encrypted_traffic() {
    let mut h = connected_harness().await;

    h.client
        .log_on(&LogOnDetails::new("gaben").password("hunter2"))
        .unwrap();

    let packet = h.server.recv().await;
    assert_eq!(packet.emsg(), EMsg::ClientLogon);
    assert!(packet.is_proto());
    let logon = packet.read_proto::<CMsgClientLogon>().unwrap().body;
    assert_eq!(logon.account_name(), "gaben");
    assert_eq!(logon.password(), "hunter2");
    assert_eq!(logon.protocol_version(), 65575);
    assert_eq!(logon.eresult_sentryfile(), 9);
    assert!(!logon.machine_id().is_empty());

    h.server.send(&logon_response(42, 76561197960287930, 1)).await;
    match next_event(&mut h.events).await {
        Event::LoggedOn(details) => {
            assert_eq!(details.result, EResult::OK);
            assert_eq!(details.steam_id.as_u64(), 76561197960287930);
            assert_eq!(details.heartbeat_seconds, 1);
        }
        other => panic!("expected LoggedOn, got {other:?}"),
    }
    assert_eq!(h.client.session_id(), 42);
    assert_eq!(h.client.web_login_nonce().as_deref(), Some("nonce"));

    // the heartbeat carries the adopted session
    let heartbeat = h.server.recv().await;
    assert_eq!(heartbeat.emsg(), EMsg::ClientHeartBeat);
    let header = heartbeat.read_proto::<CMsgClientHeartBeat>().unwrap().header;
    assert_eq!(header.proto.client_sessionid(), 42);
    assert_eq!(header.proto.steamid(), 76561197960287930);

    h.client.disconnect();
    assert!(matches!(next_event(&mut h.events).await, Event::Disconnected));
    assert!(!h.client.connected());
}

#[tokio::test]
async fn test_multi_is_unpacked_in_order() {
    let mut h = connected_harness().await;

    let first = ProtoMessage::new(
        EMsg::ClientLoggedOff,
        CMsgClientLoggedOff { eresult: Some(6) },
    )
    .to_bytes();
    let second = ProtoMessage::new(
        EMsg::ClientCMList,
        CMsgClientCMList {
            cm_addresses: vec![0x7F00_0001],
            cm_ports: vec![27017],
        },
    )
    .to_bytes();

    let mut batch = BytesMut::new();
    for sub in [&first, &second] {
        batch.put_u32_le(sub.len() as u32);
        batch.extend_from_slice(sub);
    }

    h.server
        .send(&ProtoMessage::new(
            EMsg::Multi,
            CMsgMulti {
                size_unzipped: Some(batch.len() as u32),
                message_body: Some(compress(&batch).unwrap()),
            },
        ))
        .await;

    assert!(matches!(
        next_event(&mut h.events).await,
        Event::LoggedOff {
            result: EResult::LoggedInElsewhere
        }
    ));
    match next_event(&mut h.events).await {
        Event::ServerList(servers) => {
            assert_eq!(servers, vec!["127.0.0.1:27017".parse::<std::net::SocketAddr>().unwrap()]);
        }
        other => panic!("expected ServerList, got {other:?}"),
    }
    assert_eq!(h.client.metrics().snapshot().multis_unpacked, 1);
}

#[tokio::test]
async fn test_garbage_packet_keeps_session_open() {
    let mut h = connected_harness().await;

    h.server.send_raw(&[0xFF, 0x01]).await;
    match next_event(&mut h.events).await {
        Event::Error(e) => assert!(!e.is_fatal()),
        other => panic!("expected Error, got {other:?}"),
    }
    assert!(h.client.connected());

    // still usable afterwards
    h.server.send(&logon_response(7, 76561197960287930, 9)).await;
    assert!(matches!(next_event(&mut h.events).await, Event::LoggedOn(_)));
}

#[tokio::test]
async fn test_server_close_is_fatal() {
    let mut h = connected_harness().await;
    drop(h.server);

    match next_event(&mut h.events).await {
        Event::Fatal(ProtocolError::ConnectionClosed) => {}
        other => panic!("expected Fatal(ConnectionClosed), got {other:?}"),
    }
    assert!(matches!(next_event(&mut h.events).await, Event::Disconnected));
    assert!(!h.client.connected());
    assert_eq!(h.client.metrics().snapshot().fatal_errors, 1);
}

#[tokio::test]
async fn test_universe_mismatch_fails_handshake() {
    let mut h = harness().await;
    h.server
        .send_plain(&StructMessage::new(
            MsgChannelEncryptRequest {
                protocol_version: 1,
                universe: EUniverse::Beta,
            },
            Bytes::new(),
        ))
        .await;

    match next_event(&mut h.events).await {
        Event::Fatal(ProtocolError::HandshakeError(_)) => {}
        other => panic!("expected a handshake failure, got {other:?}"),
    }
    assert!(matches!(next_event(&mut h.events).await, Event::Disconnected));
    assert_eq!(h.client.metrics().snapshot().handshakes_failed, 1);
}

#[tokio::test]
async fn test_rejected_log_on_disconnects() {
    let mut h = connected_harness().await;

    h.server
        .send(&ProtoMessage::new(
            EMsg::ClientLogOnResponse,
            CMsgClientLogonResponse {
                eresult: Some(5),
                ..Default::default()
            },
        ))
        .await;

    assert!(matches!(
        next_event(&mut h.events).await,
        Event::LogOnFailed {
            result: EResult::InvalidPassword
        }
    ));
    assert!(matches!(next_event(&mut h.events).await, Event::Disconnected));
}

#[tokio::test]
async fn test_steam_guard_keeps_connection() {
    let mut h = connected_harness().await;

    h.server
        .send(&ProtoMessage::new(
            EMsg::ClientLogOnResponse,
            CMsgClientLogonResponse {
                eresult: Some(85),
                ..Default::default()
            },
        ))
        .await;

    match next_event(&mut h.events).await {
        Event::SteamGuardRequired { kind, .. } => {
            assert_eq!(kind, steam_protocol::service::SteamGuardKind::TwoFactor);
        }
        other => panic!("expected SteamGuardRequired, got {other:?}"),
    }
    assert!(h.client.connected());
}

#[tokio::test]
async fn test_log_on_requires_connection() {
    let client = Client::builder(ClientConfig::default())
        .machine_id(FallbackMachineId)
        .build()
        .unwrap();
    assert!(matches!(
        client.log_on(&LogOnDetails::new("user").password("pw")),
        Err(ProtocolError::NotConnected)
    ));
}

#[tokio::test]
async fn test_traffic_before_encryption_is_ignored() {
    let mut h = harness().await;

    let cm_list = ProtoMessage::new(
        EMsg::ClientCMList,
        CMsgClientCMList {
            cm_addresses: vec![0x7F00_0001],
            cm_ports: vec![27017],
        },
    )
    .to_bytes();
    let mut batch = BytesMut::new();
    batch.put_u32_le(cm_list.len() as u32);
    batch.extend_from_slice(&cm_list);

    h.server
        .send_plain(&ProtoMessage::new(
            EMsg::Multi,
            CMsgMulti {
                size_unzipped: Some(0),
                message_body: Some(batch.to_vec()),
            },
        ))
        .await;
    h.server.send_plain(&logon_response(3, 76561197960287930, 9)).await;

    let key = h.key.clone();
    h.server.handshake(&key, EUniverse::Public).await;

    // neither the server list nor the log-on reply got through
    assert!(matches!(next_event(&mut h.events).await, Event::Connected));
    let snapshot = h.client.metrics().snapshot();
    assert_eq!(snapshot.multis_unpacked, 0);
    assert_eq!(snapshot.decode_errors, 0);
    assert_eq!(h.client.session_id(), 0);
}

#[tokio::test]
async fn test_server_side_log_on_failure_keeps_connection() {
    for code in [2, 20, 48] {
        let mut h = connected_harness().await;

        h.server
            .send(&ProtoMessage::new(
                EMsg::ClientLogOnResponse,
                CMsgClientLogonResponse {
                    eresult: Some(code),
                    ..Default::default()
                },
            ))
            .await;

        match next_event(&mut h.events).await {
            Event::SteamFailure { result } => assert_eq!(result, EResult::from(code)),
            other => panic!("expected SteamFailure for {code}, got {other:?}"),
        }
        assert!(h.client.connected());
        assert_eq!(h.client.session_id(), 0);
    }
}

#[tokio::test]
async fn test_new_login_key_is_acknowledged() {
    let mut h = connected_harness().await;

    h.server
        .send(&ProtoMessage::new(
            EMsg::ClientNewLoginKey,
            CMsgClientNewLoginKey {
                unique_id: Some(1234),
                login_key: Some("remember-me".into()),
            },
        ))
        .await;

    match next_event(&mut h.events).await {
        Event::LoginKey {
            unique_id,
            login_key,
        } => {
            assert_eq!(unique_id, 1234);
            assert_eq!(login_key, "remember-me");
        }
        other => panic!("expected LoginKey, got {other:?}"),
    }

    let reply = h.server.recv().await;
    assert_eq!(reply.emsg(), EMsg::ClientNewLoginKeyAccepted);
    let accepted = reply.read_proto::<CMsgClientNewLoginKeyAccepted>().unwrap().body;
    assert_eq!(accepted.unique_id, Some(1234));
}

#[tokio::test]
async fn test_machine_auth_update_is_hashed_and_answered() {
    let mut h = connected_harness().await;

    let request = ProtoMessage::new(
        EMsg::ClientUpdateMachineAuth,
        CMsgClientUpdateMachineAuth {
            filename: Some("ssfn123".into()),
            offset: Some(0),
            cubtowrite: Some(6),
            bytes: Some(b"sentry".to_vec()),
        },
    )
    .with_source_job(JobId(77));
    let expected = sha1(&request.to_bytes());
    h.server.send(&request).await;

    match next_event(&mut h.events).await {
        Event::MachineAuthUpdate { hash } => assert_eq!(hash, expected),
        other => panic!("expected MachineAuthUpdate, got {other:?}"),
    }

    let reply = h.server.recv().await;
    assert_eq!(reply.emsg(), EMsg::ClientUpdateMachineAuthResponse);
    assert_eq!(reply.target_job(), JobId(77));
    let response = reply
        .read_proto::<CMsgClientUpdateMachineAuthResponse>()
        .unwrap()
        .body;
    assert_eq!(response.sha_file.as_deref(), Some(&expected[..]));
    assert_eq!(response.filename.as_deref(), Some("ssfn123"));
    assert_eq!(response.eresult, Some(1));
    assert_eq!(response.cubwrote, Some(6));
}

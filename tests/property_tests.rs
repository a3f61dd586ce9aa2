//! Property-based tests using proptest
//!
//! These tests validate codec invariants across randomly generated inputs:
//! KeyValue trees, SteamID renderings, the session cipher and framing.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use steam_protocol::core::codec::FrameCodec;
use steam_protocol::kv::KeyValue;
use steam_protocol::protocol::emsg::EUniverse;
use steam_protocol::steamid::{EAccountType, SteamId};
use steam_protocol::utils::compression::{compress, decompress_sized};
use steam_protocol::utils::crypto::SessionCipher;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone)]
enum NodeOp {
    Object(String),
    String(String, String),
    Int32(String, i32),
    Int64(String, i64),
    Uint64(String, u64),
}

fn key() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{0,12}"
}

fn node_op() -> impl Strategy<Value = NodeOp> {
    prop_oneof![
        key().prop_map(NodeOp::Object),
        (key(), "[A-Za-z0-9 .:-]{0,24}").prop_map(|(k, v)| NodeOp::String(k, v)),
        (key(), any::<i32>()).prop_map(|(k, v)| NodeOp::Int32(k, v)),
        (key(), any::<i64>()).prop_map(|(k, v)| NodeOp::Int64(k, v)),
        (key(), any::<u64>()).prop_map(|(k, v)| NodeOp::Uint64(k, v)),
    ]
}

/// Builds a tree by attaching each node under an already created object.
fn build_tree(root_key: &str, ops: &[(usize, NodeOp)]) -> KeyValue {
    let mut tree = KeyValue::root(root_key);
    let mut objects = vec![tree.root_id()];

    for (selector, op) in ops {
        let parent = objects[selector % objects.len()];
        match op {
            NodeOp::Object(k) => {
                let id = tree.add_object(parent, k.clone());
                objects.push(id);
            }
            NodeOp::String(k, v) => {
                tree.add_string(parent, k.clone(), v.clone());
            }
            NodeOp::Int32(k, v) => {
                tree.add_int32(parent, k.clone(), *v);
            }
            NodeOp::Int64(k, v) => {
                tree.add_int64(parent, k.clone(), *v);
            }
            NodeOp::Uint64(k, v) => {
                tree.add_uint64(parent, k.clone(), *v);
            }
        }
    }
    tree
}

fn account_type() -> impl Strategy<Value = EAccountType> {
    prop::sample::select(vec![
        EAccountType::Invalid,
        EAccountType::Individual,
        EAccountType::Multiseat,
        EAccountType::GameServer,
        EAccountType::AnonGameServer,
        EAccountType::Pending,
        EAccountType::ContentServer,
        EAccountType::Clan,
        EAccountType::Chat,
        EAccountType::ConsoleUser,
        EAccountType::AnonUser,
    ])
}

/// Instance with any mix of the clan, lobby and MMS lobby chat flags.
fn chat_instance() -> impl Strategy<Value = u32> {
    (0u32..=0x1_FFFF, 0u32..8).prop_map(|(low, flags)| low | (flags << 17))
}

// Property: binary KeyValue encoding preserves the whole tree
proptest! {
    #[test]
    fn prop_keyvalue_binary_roundtrip(
        root_key in key(),
        ops in prop::collection::vec((any::<usize>(), node_op()), 0..40),
    ) {
        let tree = build_tree(&root_key, &ops);
        let bytes = tree.to_bytes().expect("encodable tree");
        prop_assert_eq!(&bytes[bytes.len() - 2..], &[0x08, 0x08][..]);

        let decoded = KeyValue::from_bytes(&bytes).expect("decodable tree");
        prop_assert_eq!(decoded.len(), tree.len());
        prop_assert_eq!(decoded, tree);
    }
}

// Property: truncating an encoded tree never decodes successfully
proptest! {
    #[test]
    fn prop_keyvalue_truncation_fails(
        ops in prop::collection::vec((any::<usize>(), node_op()), 1..20),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = build_tree("root", &ops).to_bytes().unwrap();
        // every prefix short of the root's end marker leaves the root open
        let end = cut.index(bytes.len() - 1);
        prop_assert!(KeyValue::from_bytes(&bytes[..end]).is_err());
    }
}

// Property: Steam3 rendering parses back to the same identifier
proptest! {
    #[test]
    fn prop_steam3_roundtrip(
        kind in account_type(),
        universe in 0u32..=4,
        account_id in any::<u32>(),
        instance in chat_instance(),
    ) {
        let id = SteamId::new(kind, EUniverse::from_u32(universe), account_id, instance);
        let rendered = id.steam3();
        let parsed: SteamId = rendered.parse().expect("rendered form parses");
        prop_assert_eq!(parsed, id);
    }

    #[test]
    fn prop_chat_steam3_roundtrip(
        account_id in any::<u32>(),
        instance in chat_instance(),
    ) {
        let id = SteamId::new(EAccountType::Chat, EUniverse::Public, account_id, instance);
        let parsed = SteamId::parse_steam3(&id.steam3()).expect("rendered form parses");
        prop_assert_eq!(parsed.instance(), instance);
        prop_assert_eq!(parsed, id);
    }
}

// Property: Steam2 rendering round-trips for desktop individuals
proptest! {
    #[test]
    fn prop_steam2_roundtrip(universe in 0u32..=4, account_id in any::<u32>()) {
        let id = SteamId::new(
            EAccountType::Individual,
            EUniverse::from_u32(universe),
            account_id,
            1,
        );
        prop_assert_eq!(SteamId::parse_steam2(&id.steam2()).unwrap(), id);
    }
}

// Property: the session cipher round-trips and always emits IV + whole blocks
proptest! {
    #[test]
    fn prop_session_cipher_roundtrip(
        key in prop::array::uniform32(any::<u8>()),
        plaintext in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let cipher = SessionCipher::new(&key).unwrap();
        let sealed = cipher.encrypt(&plaintext).unwrap();

        prop_assert_eq!(sealed.len() % 16, 0);
        prop_assert_eq!(sealed.len(), 16 + (plaintext.len() / 16 + 1) * 16);
        prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
    }
}

// Property: ciphertexts that are not whole blocks are rejected
proptest! {
    #[test]
    fn prop_session_cipher_rejects_partial_blocks(
        key in prop::array::uniform32(any::<u8>()),
        junk in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        prop_assume!(junk.len() % 16 != 0 || junk.len() < 32);
        let cipher = SessionCipher::new(&key).unwrap();
        prop_assert!(cipher.decrypt(&junk).is_err());
    }
}

// Property: only 32-byte keys are accepted
proptest! {
    #[test]
    fn prop_session_key_length(len in 0usize..128) {
        let key = vec![7u8; len];
        prop_assert_eq!(SessionCipher::new(&key).is_ok(), len == 32);
    }
}

// Property: frames survive arbitrary split points in the byte stream
proptest! {
    #[test]
    fn prop_frames_reassemble(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 1..8),
        split in any::<prop::sample::Index>(),
    ) {
        let mut codec = FrameCodec::default();
        let mut wire = BytesMut::new();
        for payload in &payloads {
            codec.encode(Bytes::from(payload.clone()), &mut wire).unwrap();
        }

        let at = split.index(wire.len() + 1);
        let mut buffer = BytesMut::from(&wire[..at]);
        let mut decoded = Vec::new();
        while let Some(frame) = codec.decode(&mut buffer).unwrap() {
            decoded.push(frame.to_vec());
        }
        buffer.extend_from_slice(&wire[at..]);
        while let Some(frame) = codec.decode(&mut buffer).unwrap() {
            decoded.push(frame.to_vec());
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded, payloads);
    }
}

// Property: gzip batches decompress only to their announced size
proptest! {
    #[test]
    fn prop_sized_decompression(data in prop::collection::vec(any::<u8>(), 1..20000)) {
        let compressed = compress(&data).unwrap();
        prop_assert_eq!(decompress_sized(&compressed, data.len()).unwrap(), data.clone());
        prop_assert!(decompress_sized(&compressed, data.len() + 1).is_err());
    }
}

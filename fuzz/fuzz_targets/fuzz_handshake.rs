#![no_main]

use libfuzzer_sys::fuzz_target;
use steam_protocol::protocol::emsg::EUniverse;
use steam_protocol::protocol::handshake::ChannelHandshake;
use steam_protocol::protocol::messages::{MsgChannelEncryptRequest, MsgChannelEncryptResult};
use steam_protocol::protocol::packet::Packet;
use steam_protocol::utils::crypto::UniverseKeys;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary packets through the handshake state machine
    let Ok(packet) = Packet::new(data.to_vec()) else {
        return;
    };

    let mut handshake = ChannelHandshake::new(EUniverse::Public);
    if let Ok(request) = packet.read_struct::<MsgChannelEncryptRequest>() {
        let _ = handshake.handle_encrypt_request(&request.body, &UniverseKeys::builtin());
    }
    if let Ok(result) = packet.read_struct::<MsgChannelEncryptResult>() {
        let _ = handshake.handle_encrypt_result(&result.body);
    }
});

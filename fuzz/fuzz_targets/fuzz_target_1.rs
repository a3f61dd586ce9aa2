#![no_main]

use libfuzzer_sys::fuzz_target;
use steam_protocol::{KeyValue, Packet};

fuzz_target!(|data: &[u8]| {
    // Header classification and KeyValue decoding must never panic
    let _ = Packet::new(data.to_vec());
    let _ = KeyValue::from_bytes(data);
});

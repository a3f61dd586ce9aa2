#![no_main]

use libfuzzer_sys::fuzz_target;
use steam_protocol::utils::compression::{compress, decompress, decompress_sized};

fuzz_target!(|data: &[u8]| {
    // Round trip must hold for any input
    if let Ok(compressed) = compress(data) {
        let out = decompress(&compressed).expect("own output inflates");
        assert_eq!(out, data);
    }

    // Raw input as a Multi body: must never panic or exceed the announced size
    let announced = data.first().map(|b| usize::from(*b) * 64).unwrap_or(0);
    if let Ok(out) = decompress_sized(data, announced) {
        assert_eq!(out.len(), announced);
    }
    let _ = decompress(data);
});

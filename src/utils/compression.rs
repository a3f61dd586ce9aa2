//! Gzip helpers for `Multi` bundles.
//!
//! The server gzips large `Multi` batches and reports the unzipped size
//! alongside. Decompression is bounded so a forged size or a gzip bomb
//! cannot exhaust memory.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{ProtocolError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Upper bound on inflated output, aligned with the frame limit.
pub const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Gzip `data` at the default level.
///
/// # Errors
/// Returns `ProtocolError::CompressionFailure` if the encoder fails
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|_| ProtocolError::CompressionFailure)?;
    encoder.finish().map_err(|_| ProtocolError::CompressionFailure)
}

/// Inflate a gzip stream, refusing output larger than [`MAX_DECOMPRESSION_SIZE`].
///
/// # Errors
/// Returns `ProtocolError::DecompressionFailure` if:
/// - the stream is not valid gzip
/// - output exceeds the limit
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_limit(data, MAX_DECOMPRESSION_SIZE)
}

/// Inflate a gzip stream, refusing output larger than `limit`.
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut reader = GzDecoder::new(data);
    let mut out = Vec::new();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if out.len() + n > limit {
                    return Err(ProtocolError::DecompressionFailure);
                }
                out.extend_from_slice(&buffer[..n]);
            }
            Err(_) => return Err(ProtocolError::DecompressionFailure),
        }
    }
    Ok(out)
}

/// Inflate a `Multi` body whose unzipped size was announced by the sender.
///
/// The announced size is checked against the limit before inflating and
/// against the real output afterwards.
pub fn decompress_sized(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    if expected_len > MAX_DECOMPRESSION_SIZE {
        return Err(ProtocolError::DecompressionFailure);
    }

    let out = decompress_with_limit(data, expected_len)?;
    if out.len() != expected_len {
        return Err(ProtocolError::DecompressionFailure);
    }
    Ok(out)
}

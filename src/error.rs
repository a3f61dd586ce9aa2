//! # Error Types
//!
//! Error handling for the CM protocol client.
//!
//! This module defines every error variant that can surface from the
//! transport, the message model, the session handshake and the login flow.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Framing Errors**: bad magic, oversized frames, closed connections
//! - **Cryptographic Errors**: RSA/AES failures and bad session keys
//! - **Handshake Errors**: wrong universe, non-OK encryption result
//! - **Decode Errors**: truncated struct bodies, malformed protobuf, wrong header shape
//! - **KeyValue Errors**: binary KeyValue codec failures
//!
//! Framing, cryptographic and handshake failures are connection-fatal (see
//! [`ProtocolError::is_fatal`]); everything else is reported and the session
//! carries on.
//!
//! ## Example Usage
//! ```rust
//! use steam_protocol::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse::<u16>()
//!         .map_err(|e| ProtocolError::ConfigError(format!("bad port {raw:?}: {e}")))
//! }
//!
//! match parse_port("27017") {
//!     Ok(port) => info!(port, "parsed port"),
//!     Err(e) => error!(error = %e, "could not parse port"),
//! }
//! ```

use crate::protocol::emsg::EMsg;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Cryptographic errors
    pub const ERR_KEY_ALREADY_SET: &str = "Session key is already installed";
    pub const ERR_RSA_ENCRYPT: &str = "RSA encryption of session key failed";
    pub const ERR_NO_UNIVERSE_KEY: &str = "No public key for universe";

    /// Handshake-specific errors
    pub const ERR_UNEXPECTED_ENCRYPT_REQUEST: &str =
        "Encryption request received outside of the handshake window";
    pub const ERR_SESSION_KEY_NOT_FOUND: &str = "Temporary session key not found";

    /// Login errors
    pub const ERR_MISSING_USERNAME: &str = "Username is required to log on";
    pub const ERR_MISSING_SECRET: &str = "Either a password or a login key is required to log on";

    /// Packet decoding errors
    pub const ERR_TRUNCATED_HEADER: &str = "Truncated message header";
    pub const ERR_MULTI_LENGTH: &str = "Malformed sub-message length in multi bundle";
    pub const ERR_MULTI_DEPTH: &str = "Multi bundles nested too deeply";

    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
}

/// Failures of the binary KeyValue codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyValueError {
    /// The input ended before the first byte of a node.
    #[error("EOF")]
    Eof,

    /// The input ended part way through a node.
    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("unsupported KeyValue type byte {0:#04x}")]
    UnknownType(u8),

    #[error("nodes of type {0} cannot be encoded")]
    Unencodable(&'static str),

    #[error("invalid {kind} value {value:?} for key {key:?}")]
    InvalidValue {
        kind: &'static str,
        key: String,
        value: String,
    },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("objects nested deeper than {0} levels")]
    TooDeep(usize),
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Client is not connected")]
    NotConnected,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Session key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Message {emsg:?} does not carry a {expected} header")]
    WrongHeaderShape { emsg: EMsg, expected: &'static str },

    #[error("Protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("KeyValue error: {0}")]
    KeyValue(#[from] KeyValueError),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("Server directory error: {0}")]
    DirectoryError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error leaves the session in an unrecoverable state.
    ///
    /// Fatal errors come from the transport (framing, I/O, cipher) and the
    /// encryption handshake; the client disconnects when one is observed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::InvalidMagic { .. }
                | ProtocolError::OversizedPacket(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::DecryptionFailure
                | ProtocolError::EncryptionFailure
                | ProtocolError::InvalidKeyLength(_)
                | ProtocolError::SecurityError(_)
                | ProtocolError::HandshakeError(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

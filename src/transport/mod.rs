//! # Transport Layer
//!
//! Framed, optionally encrypted TCP connections to CM servers.
//!
//! ## Framing
//! ```text
//! [u32 LE payload length][u32 LE magic "VT01"][payload]
//! ```
//!
//! The payload is plaintext until the channel handshake completes and
//! AES-encrypted afterwards. See [`tcp::EncryptionState`].

pub mod tcp;

pub use tcp::{ConnectionReader, ConnectionWriter, EncryptionState, TcpConnection};

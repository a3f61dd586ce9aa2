//! # Core Protocol Components
//!
//! Low-level framing and binary serialization.
//!
//! ## Components
//! - **Codec**: Tokio codec for framing over the TCP byte stream
//! - **Serialization**: bounds-checked little-endian reads and the `Serializable` trait
//!
//! ## Wire Format
//! ```text
//! [Length(4, LE)] [Magic(4) = "VT01"] [Payload(Length)]
//! ```
//!
//! The payload is AES-encrypted once the channel handshake completes.
//!
//! ## Security
//! - Maximum frame size: 16MB (prevents memory exhaustion)
//! - Magic is checked before the length is trusted

pub mod codec;
pub mod serialization;

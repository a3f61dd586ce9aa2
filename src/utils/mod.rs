//! # Utility Modules
//!
//! Supporting code shared by the transport and the client.
//!
//! ## Components
//! - **Crypto**: session cipher, RSA key wrapping, SHA-1
//! - **Compression**: bounded gzip for `Multi` bundles
//! - **Logging**: tracing subscriber setup
//! - **Metrics**: per-client counters
//! - **Timeout**: async timeout wrappers
//!
//! ## Security
//! - Session keys come from the OS RNG and are zeroed on drop
//! - Decompression is capped at the frame size limit

pub mod compression;
pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};

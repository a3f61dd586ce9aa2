//! # Steam Protocol
//!
//! Client-side core of the Steam connection-manager (CM) protocol.
//!
//! ## Layers
//! - **core**: frame codec and little-endian serialization
//! - **transport**: framed TCP connection with the AES session cipher
//! - **protocol**: message model, packet decoding, channel handshake, dispatch
//! - **service**: the [`Client`], log-on flow, Game Coordinator, server directory
//! - **kv**: binary KeyValue trees
//! - **steamid**: 64-bit account identifiers
//! - **utils**: crypto, compression, logging, metrics, timeouts
//!
//! ## Quick Start
//! ```rust,no_run
//! use steam_protocol::{Client, ClientConfig, Event, LogOnDetails};
//! use tokio_stream::StreamExt;
//!
//! # async fn run() -> steam_protocol::Result<()> {
//! let client = Client::new(ClientConfig::default())?;
//! steam_protocol::utils::logging::init_logging(&client.config().logging);
//! let mut events = client.events().expect("first call");
//! client.connect().await?;
//!
//! while let Some(event) = events.next().await {
//!     match event {
//!         Event::Connected => {
//!             client.log_on(&LogOnDetails::new("user").password("secret"))?;
//!         }
//!         Event::LoggedOn(details) => println!("logged on as {}", details.steam_id),
//!         Event::Fatal(e) => return Err(e),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod kv;
pub mod protocol;
pub mod service;
pub mod steamid;
pub mod transport;
pub mod utils;

pub use config::ClientConfig;
pub use error::{ProtocolError, Result};
pub use kv::KeyValue;
pub use protocol::emsg::{EMsg, EResult, EUniverse};
pub use protocol::packet::Packet;
pub use service::{Client, ClientBuilder, Event, LogOnDetails};
pub use steamid::SteamId;

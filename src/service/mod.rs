//! # Client Services
//!
//! The session-level client built on the transport and protocol layers.
//!
//! ## Components
//! - **client**: connection lifecycle, channel handshake, read/write loops, heartbeat
//! - **events**: notifications delivered to the application
//! - **auth**: log-on, log-off and the server pushes that follow them
//! - **gc**: Game Coordinator sub-channel
//! - **directory**: CM server list lookup and cache
//! - **machine_id**: machine fingerprint sent on log-on

pub mod auth;
pub mod client;
pub mod directory;
pub mod events;
pub mod gc;
pub mod machine_id;

pub use auth::LogOnDetails;
pub use client::{Client, ClientBuilder, EventStream};
pub use events::{Event, LoggedOn, SteamGuardKind};

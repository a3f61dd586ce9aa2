//! # Protocol Layer
//!
//! Message model, packet decoding, channel handshake and dispatch.
//!
//! ## Components
//! - **emsg**: message types, result codes, universes and the protobuf bit
//! - **header / message / messages / proto**: the three message shapes and their bodies
//! - **packet**: classification and typed reads of inbound frames
//! - **gc**: Game Coordinator envelope, messages and packets
//! - **handshake**: channel encryption state machine
//! - **dispatcher**: ordered fan-out to registered handlers
//!
//! ## Message Flow
//! ```text
//! frame -> Packet::new -> client system handlers -> Dispatcher -> handlers
//! ```

pub mod dispatcher;
pub mod emsg;
pub mod gc;
pub mod handshake;
pub mod header;
pub mod job;
pub mod message;
pub mod messages;
pub mod packet;
pub mod proto;

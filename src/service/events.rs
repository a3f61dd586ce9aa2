//! Notifications emitted by a [`Client`](crate::service::client::Client).
//!
//! Events are delivered on an unbounded channel in the order they occur.
//! The stream stays open for the lifetime of the client, across
//! reconnects.

use crate::error::ProtocolError;
use crate::protocol::emsg::EResult;
use crate::protocol::proto::CMsgClientLogonResponse;
use crate::steamid::SteamId;
use std::net::SocketAddr;

#[derive(Debug)]
pub enum Event {
    /// The channel handshake finished; the session is encrypted.
    Connected,

    /// The connection was closed, by either side.
    Disconnected,

    /// A transport or handshake failure. The client has already
    /// disconnected and may be reused for a fresh connect.
    Fatal(ProtocolError),

    /// A packet could not be processed. The connection stays open.
    Error(ProtocolError),

    LoggedOn(Box<LoggedOn>),

    /// Log-on was rejected; the client disconnects.
    LogOnFailed { result: EResult },

    /// Log-on needs a Steam Guard code. Retry with the matching field of
    /// [`LogOnDetails`](crate::service::auth::LogOnDetails) populated.
    SteamGuardRequired { kind: SteamGuardKind, result: EResult },

    /// A server-side problem; the server is expected to drop the
    /// connection shortly.
    SteamFailure { result: EResult },

    /// A login key to persist for password-less log-ons.
    LoginKey { unique_id: u32, login_key: String },

    LoggedOff { result: EResult },

    /// SHA-1 of the machine-auth blob; persist it as the sentry hash.
    MachineAuthUpdate { hash: [u8; 20] },

    AccountInfo {
        persona_name: String,
        country: String,
        count_authed_computers: i32,
        account_flags: u32,
    },

    /// Fresh CM server addresses pushed by the server.
    ServerList(Vec<SocketAddr>),
}

/// Details of a successful log-on.
#[derive(Debug, Clone)]
pub struct LoggedOn {
    pub result: EResult,
    pub extended_result: EResult,
    pub account_flags: u32,
    pub steam_id: SteamId,
    pub client_supplied_steam_id: SteamId,
    pub heartbeat_seconds: u32,
    pub body: CMsgClientLogonResponse,
}

/// Which Steam Guard credential the server asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteamGuardKind {
    /// A code was mailed to the account address; set `auth_code`.
    EmailCode,
    /// The account uses the mobile authenticator; set `two_factor_code`.
    TwoFactor,
    /// The supplied two-factor code was wrong.
    TwoFactorMismatch,
}

impl SteamGuardKind {
    /// Maps the log-on result codes that ask for a Steam Guard code.
    pub fn from_result(result: EResult) -> Option<Self> {
        match result {
            EResult::AccountLogonDenied => Some(Self::EmailCode),
            EResult::AccountLoginDeniedNeedTwoFactor => Some(Self::TwoFactor),
            EResult::TwoFactorCodeMismatch => Some(Self::TwoFactorMismatch),
            _ => None,
        }
    }
}

impl Event {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::Fatal(_))
    }
}

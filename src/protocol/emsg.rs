//! Protocol enumerations: message types, result codes and universes.
//!
//! Message type tags travel as little-endian `u32` values whose high bit is
//! reserved to flag protobuf-encoded bodies. The helpers at the bottom of
//! this module are the only place that bit is set or cleared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit set on a raw message type when its body is protobuf-encoded.
pub const PROTO_MASK: u32 = 0x8000_0000;

/// Declares a `u32`-backed enum with a catch-all variant for values this
/// crate does not name.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident / $other:ident {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            $other(u32),
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                match raw {
                    $($value => $name::$variant,)+
                    other => $name::$other(other),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                match value {
                    $($name::$variant => $value,)+
                    $name::$other(other) => other,
                }
            }
        }
    };
}

wire_enum! {
    /// Logical message type (without the protobuf bit).
    pub enum EMsg / Other {
        Invalid = 0,
        Multi = 1,
        ClientHeartBeat = 703,
        ClientLogOff = 706,
        ClientGamesPlayed = 742,
        ClientLogOnResponse = 751,
        ClientLoggedOff = 757,
        ClientAccountInfo = 768,
        ClientCMList = 783,
        ChannelEncryptRequest = 1303,
        ChannelEncryptResponse = 1304,
        ChannelEncryptResult = 1305,
        ClientToGC = 5452,
        ClientFromGC = 5453,
        ClientNewLoginKey = 5463,
        ClientNewLoginKeyAccepted = 5464,
        ClientLogon = 5514,
        ClientUpdateMachineAuth = 5537,
        ClientUpdateMachineAuthResponse = 5538,
    }
}

wire_enum! {
    /// Result code carried by responses and log-on replies.
    pub enum EResult / Unknown {
        Invalid = 0,
        OK = 1,
        Fail = 2,
        NoConnection = 3,
        InvalidPassword = 5,
        LoggedInElsewhere = 6,
        InvalidProtocolVer = 7,
        InvalidParam = 8,
        FileNotFound = 9,
        Busy = 10,
        InvalidState = 11,
        AccessDenied = 15,
        Timeout = 16,
        Banned = 17,
        AccountNotFound = 18,
        ServiceUnavailable = 20,
        NotLoggedOn = 21,
        Pending = 22,
        EncryptionFailure = 23,
        LimitExceeded = 25,
        Revoked = 26,
        Expired = 27,
        TryAnotherCM = 48,
        AccountLogonDenied = 63,
        InvalidLoginAuthCode = 65,
        AccountLogonDeniedNoMail = 66,
        RateLimitExceeded = 84,
        AccountLoginDeniedNeedTwoFactor = 85,
        TwoFactorCodeMismatch = 88,
    }
}

impl From<i32> for EResult {
    fn from(raw: i32) -> Self {
        EResult::from(raw as u32)
    }
}

impl fmt::Display for EMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EMsg::Other(raw) => write!(f, "EMsg({raw})"),
            named => write!(f, "{named:?}"),
        }
    }
}

/// Deployment realm scoping identities and encryption keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EUniverse {
    Invalid = 0,
    #[default]
    Public = 1,
    Beta = 2,
    Internal = 3,
    Dev = 4,
}

impl EUniverse {
    /// Maps a raw value, normalizing anything out of range to `Invalid`.
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            1 => EUniverse::Public,
            2 => EUniverse::Beta,
            3 => EUniverse::Internal,
            4 => EUniverse::Dev,
            _ => EUniverse::Invalid,
        }
    }
}

/// Returns true when the raw type tag carries the protobuf bit.
#[inline]
pub fn is_proto(raw: u32) -> bool {
    raw & PROTO_MASK != 0
}

/// Strips the protobuf bit from a raw type tag.
#[inline]
pub fn mask(raw: u32) -> EMsg {
    EMsg::from(raw & !PROTO_MASK)
}

/// Raw wire value of `emsg` with the protobuf bit set.
#[inline]
pub fn with_proto(emsg: EMsg) -> u32 {
    u32::from(emsg) | PROTO_MASK
}

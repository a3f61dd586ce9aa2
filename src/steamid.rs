//! # SteamID
//!
//! 64-bit account identity with four bit-packed fields.
//!
//! ```text
//! bits 56..64  universe      (8)
//! bits 52..56  account type  (4)
//! bits 32..52  instance      (20, top 3 bits are chat flags)
//! bits  0..32  account id    (32)
//! ```
//!
//! Two textual forms are understood: the legacy `STEAM_U:A:N` form and the
//! structured `[T:U:N:I]` form.

use crate::protocol::emsg::EUniverse;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ACCOUNT_ID_OFFSET: u32 = 0;
const ACCOUNT_ID_MASK: u64 = 0xFFFF_FFFF;
const INSTANCE_OFFSET: u32 = 32;
const INSTANCE_MASK: u64 = 0xF_FFFF;
const TYPE_OFFSET: u32 = 52;
const TYPE_MASK: u64 = 0xF;
const UNIVERSE_OFFSET: u32 = 56;
const UNIVERSE_MASK: u64 = 0xFF;

/// Instance bits without the chat flags.
const INSTANCE_ONLY_MASK: u32 = 0x1_FFFF;

/// Well-known instance values and chat flags.
pub mod instance {
    pub const UNKNOWN: u32 = 0;
    pub const DESKTOP: u32 = 1;
    pub const CONSOLE: u32 = 2;
    pub const WEB: u32 = 4;

    pub const CHAT_CLAN: u32 = 0x8_0000;
    pub const CHAT_LOBBY: u32 = 0x4_0000;
    pub const CHAT_MMS_LOBBY: u32 = 0x2_0000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EAccountType {
    Invalid = 0,
    Individual = 1,
    Multiseat = 2,
    GameServer = 3,
    AnonGameServer = 4,
    Pending = 5,
    ContentServer = 6,
    Clan = 7,
    Chat = 8,
    ConsoleUser = 9,
    AnonUser = 10,
}

impl EAccountType {
    /// Out-of-range values normalize to `Invalid`.
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            1 => EAccountType::Individual,
            2 => EAccountType::Multiseat,
            3 => EAccountType::GameServer,
            4 => EAccountType::AnonGameServer,
            5 => EAccountType::Pending,
            6 => EAccountType::ContentServer,
            7 => EAccountType::Clan,
            8 => EAccountType::Chat,
            9 => EAccountType::ConsoleUser,
            10 => EAccountType::AnonUser,
            _ => EAccountType::Invalid,
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        Some(match c {
            'I' => EAccountType::Invalid,
            'U' => EAccountType::Individual,
            'M' => EAccountType::Multiseat,
            'G' => EAccountType::GameServer,
            'A' => EAccountType::AnonGameServer,
            'P' => EAccountType::Pending,
            'C' => EAccountType::ContentServer,
            'g' => EAccountType::Clan,
            'T' | 'L' | 'c' => EAccountType::Chat,
            'a' => EAccountType::AnonUser,
            'i' => EAccountType::ConsoleUser,
            _ => return None,
        })
    }

    fn letter(self, instance: u32) -> char {
        match self {
            EAccountType::Invalid => 'I',
            EAccountType::Individual => 'U',
            EAccountType::Multiseat => 'M',
            EAccountType::GameServer => 'G',
            EAccountType::AnonGameServer => 'A',
            EAccountType::Pending => 'P',
            EAccountType::ContentServer => 'C',
            EAccountType::Clan => 'g',
            EAccountType::Chat if instance & instance::CHAT_CLAN != 0 => 'c',
            EAccountType::Chat if instance & instance::CHAT_LOBBY != 0 => 'L',
            EAccountType::Chat => 'T',
            EAccountType::AnonUser => 'a',
            EAccountType::ConsoleUser => 'i',
        }
    }
}

/// Errors from parsing a textual SteamID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SteamID {0:?}")]
pub struct ParseSteamIdError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(u64);

impl SteamId {
    pub fn new(
        account_type: EAccountType,
        universe: EUniverse,
        account_id: u32,
        instance: u32,
    ) -> Self {
        SteamId(0)
            .with_account_type(account_type)
            .with_universe(universe)
            .with_account_id(account_id)
            .with_instance(instance)
    }

    pub const fn from_u64(raw: u64) -> Self {
        SteamId(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    fn get(self, offset: u32, mask: u64) -> u64 {
        (self.0 >> offset) & mask
    }

    fn set(self, offset: u32, mask: u64, value: u64) -> Self {
        SteamId((self.0 & !(mask << offset)) | ((value & mask) << offset))
    }

    pub fn account_id(self) -> u32 {
        self.get(ACCOUNT_ID_OFFSET, ACCOUNT_ID_MASK) as u32
    }

    pub fn with_account_id(self, account_id: u32) -> Self {
        self.set(ACCOUNT_ID_OFFSET, ACCOUNT_ID_MASK, account_id as u64)
    }

    pub fn instance(self) -> u32 {
        self.get(INSTANCE_OFFSET, INSTANCE_MASK) as u32
    }

    pub fn with_instance(self, instance: u32) -> Self {
        self.set(INSTANCE_OFFSET, INSTANCE_MASK, instance as u64)
    }

    pub fn account_type(self) -> EAccountType {
        EAccountType::from_u32(self.get(TYPE_OFFSET, TYPE_MASK) as u32)
    }

    pub fn with_account_type(self, account_type: EAccountType) -> Self {
        self.set(TYPE_OFFSET, TYPE_MASK, account_type as u64)
    }

    pub fn universe(self) -> EUniverse {
        EUniverse::from_u32(self.get(UNIVERSE_OFFSET, UNIVERSE_MASK) as u32)
    }

    pub fn with_universe(self, universe: EUniverse) -> Self {
        self.set(UNIVERSE_OFFSET, UNIVERSE_MASK, universe as u64)
    }

    /// Clan id converted to its clan chat room id. Other ids are returned unchanged.
    pub fn clan_to_chat(self) -> Self {
        if self.account_type() != EAccountType::Clan {
            return self;
        }
        let inst = (self.instance() & INSTANCE_ONLY_MASK) | instance::CHAT_CLAN;
        self.with_instance(inst).with_account_type(EAccountType::Chat)
    }

    /// Clan chat room id converted back to its clan id.
    pub fn chat_to_clan(self) -> Self {
        if self.account_type() != EAccountType::Chat {
            return self;
        }
        self.with_instance(self.instance() & INSTANCE_ONLY_MASK)
            .with_account_type(EAccountType::Clan)
    }

    /// Legacy `STEAM_U:A:N` rendering.
    pub fn steam2(self) -> String {
        let account_id = self.account_id();
        format!(
            "STEAM_{}:{}:{}",
            self.universe() as u32,
            account_id & 1,
            account_id >> 1
        )
    }

    /// Structured `[T:U:N:I]` rendering.
    ///
    /// The chat flag named by the letter is left out of `I`; any other
    /// instance bits, including an MMS lobby flag, stay in it.
    pub fn steam3(self) -> String {
        let inst = self.instance();
        let letter = self.account_type().letter(inst);
        format!(
            "[{}:{}:{}:{}]",
            letter,
            self.universe() as u32,
            self.account_id(),
            inst & !letter_chat_flag(letter)
        )
    }

    /// Parses `STEAM_U:A:N`.
    pub fn parse_steam2(s: &str) -> Result<Self, ParseSteamIdError> {
        let err = || ParseSteamIdError(s.to_string());

        let rest = s.strip_prefix("STEAM_").ok_or_else(err)?;
        let mut parts = rest.split(':');
        let (universe, auth, number) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(a), Some(n), None) => (u, a, n),
            _ => return Err(err()),
        };

        let universe = parse_digit_in(universe, 0..=4).ok_or_else(err)?;
        let auth = parse_digit_in(auth, 0..=1).ok_or_else(err)?;
        let number = parse_decimal(number).ok_or_else(err)?;

        Ok(SteamId::new(
            EAccountType::Individual,
            EUniverse::from_u32(universe),
            (number << 1) | auth,
            instance::DESKTOP,
        ))
    }

    /// Parses `[T:U:N]` or `[T:U:N:I]`.
    pub fn parse_steam3(s: &str) -> Result<Self, ParseSteamIdError> {
        let err = || ParseSteamIdError(s.to_string());

        let body = s
            .strip_prefix('[')
            .and_then(|b| b.strip_suffix(']'))
            .ok_or_else(err)?;
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(err());
        }

        let mut letter = parts[0].chars();
        let letter = match (letter.next(), letter.next()) {
            (Some(c), None) => c,
            _ => return Err(err()),
        };
        let account_type = EAccountType::from_letter(letter).ok_or_else(err)?;
        let universe = parse_digit_in(parts[1], 0..=4).ok_or_else(err)?;
        let account_id = parse_decimal(parts[2]).ok_or_else(err)?;

        let mut inst = match parts.get(3) {
            Some(raw) => parse_decimal(raw).ok_or_else(err)?,
            None if matches!(letter, 'g' | 'T' | 'c' | 'L') => instance::UNKNOWN,
            None => instance::DESKTOP,
        };
        inst |= letter_chat_flag(letter);

        Ok(SteamId::new(
            account_type,
            EUniverse::from_u32(universe),
            account_id,
            inst,
        ))
    }
}

/// Chat flag implied by a Steam3 type letter.
fn letter_chat_flag(letter: char) -> u32 {
    match letter {
        'c' => instance::CHAT_CLAN,
        'L' => instance::CHAT_LOBBY,
        _ => 0,
    }
}

fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_digit_in(s: &str, range: std::ops::RangeInclusive<u32>) -> Option<u32> {
    if s.len() != 1 {
        return None;
    }
    parse_decimal(s).filter(|d| range.contains(d))
}

impl FromStr for SteamId {
    type Err = ParseSteamIdError;

    /// Accepts the Steam2 form, the Steam3 form or a raw 64-bit decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("STEAM_") {
            Self::parse_steam2(s)
        } else if s.starts_with('[') {
            Self::parse_steam3(s)
        } else {
            s.parse::<u64>()
                .map(SteamId)
                .map_err(|_| ParseSteamIdError(s.to_string()))
        }
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.steam3())
    }
}

impl From<u64> for SteamId {
    fn from(raw: u64) -> Self {
        SteamId(raw)
    }
}

impl From<SteamId> for u64 {
    fn from(id: SteamId) -> u64 {
        id.0
    }
}

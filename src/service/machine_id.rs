//! Machine identity sent with every log-on.
//!
//! Steam fingerprints the machine through three hashed identifiers packed
//! into a binary KeyValue `MessageObject`. Where they come from is
//! pluggable through [`MachineIdProvider`].

use crate::error::Result;
use crate::kv::KeyValue;
use crate::utils::crypto::sha1_hex;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

const KEY_MACHINE_UUID: &str = "BB3";
const KEY_MAC_ADDRESS: &str = "FF2";
const KEY_DISK_UUID: &str = "3B3";

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];
const NET_CLASS_DIR: &str = "/sys/class/net";

/// Raw identifiers of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineId {
    pub machine_uuid: [u8; 16],
    pub mac_address: [u8; 6],
    pub disk_uuid: [u8; 16],
}

impl MachineId {
    /// Nil UUIDs and a zero MAC.
    pub const fn fallback() -> Self {
        Self {
            machine_uuid: [0; 16],
            mac_address: [0; 6],
            disk_uuid: [0; 16],
        }
    }

    /// The `MessageObject` tree carrying the SHA-1 hex digest of each
    /// identifier.
    pub fn message_object(&self) -> KeyValue {
        KeyValue::root("MessageObject")
            .with_string(KEY_MACHINE_UUID, sha1_hex(&self.machine_uuid))
            .with_string(KEY_MAC_ADDRESS, sha1_hex(&self.mac_address))
            .with_string(KEY_DISK_UUID, sha1_hex(&self.disk_uuid))
    }

    /// Binary-encoded [`message_object`](Self::message_object), as sent in
    /// the log-on `machine_id` field.
    pub fn auth_payload(&self) -> Result<Vec<u8>> {
        Ok(self.message_object().to_bytes()?)
    }
}

/// Source of the [`MachineId`] sent on log-on.
pub trait MachineIdProvider: Send + Sync + fmt::Debug {
    fn machine_id(&self) -> MachineId;
}

impl MachineIdProvider for MachineId {
    fn machine_id(&self) -> MachineId {
        *self
    }
}

/// Always reports [`MachineId::fallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackMachineId;

impl MachineIdProvider for FallbackMachineId {
    fn machine_id(&self) -> MachineId {
        MachineId::fallback()
    }
}

/// Reads identifiers from the running system.
///
/// The machine UUID comes from the systemd or D-Bus machine-id file and
/// the MAC from the first non-loopback interface. The disk UUID is not
/// discoverable without udev and stays nil; so does anything else that
/// cannot be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMachineId;

impl MachineIdProvider for SystemMachineId {
    fn machine_id(&self) -> MachineId {
        let machine_uuid = MACHINE_ID_PATHS
            .iter()
            .find_map(|path| fs::read_to_string(path).ok())
            .and_then(|raw| parse_uuid(&raw))
            .unwrap_or_default();

        let mac_address = read_mac_address(Path::new(NET_CLASS_DIR)).unwrap_or_default();

        debug!(
            has_machine_uuid = machine_uuid != [0; 16],
            has_mac = mac_address != [0; 6],
            "machine identity collected"
        );

        MachineId {
            machine_uuid,
            mac_address,
            disk_uuid: [0; 16],
        }
    }
}

/// Parses 32 hex digits, dashes allowed, into UUID bytes.
fn parse_uuid(raw: &str) -> Option<[u8; 16]> {
    let digits: String = raw.trim().chars().filter(|&c| c != '-').collect();
    let mut out = [0u8; 16];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

/// Parses `aa:bb:cc:dd:ee:ff`.
fn parse_mac(raw: &str) -> Option<[u8; 6]> {
    let digits: String = raw.trim().split(':').collect();
    let mut out = [0u8; 6];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

/// First non-zero MAC among the interfaces under `net_dir`, loopback
/// excluded, in name order.
fn read_mac_address(net_dir: &Path) -> Option<[u8; 6]> {
    let mut names: Vec<_> = fs::read_dir(net_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.iter().find_map(|name| {
        let raw = fs::read_to_string(net_dir.join(name).join("address")).ok()?;
        parse_mac(&raw).filter(|mac| *mac != [0; 6])
    })
}

//! BIP32 addressing and raw address inspection.
//!
//! Addresses are carried as hex of their raw bytes. The high nibble of the
//! first byte identifies the address kind (CIP-19); Shelley addresses carry
//! the network id in the low nibble.

use crate::constants::{chain, level, purpose, COIN_TYPE, HARD_DERIVATION_START, KEY_HASH_SIZE, STAKING_KEY_INDEX};
use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// Derivation path of the key controlling an address.
///
/// `start_level` is the level of `path[0]`; a full Shelley path
/// `m/1852'/1815'/0'/0/3` has `start_level == 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addressing {
    pub path: Vec<u32>,
    pub start_level: u32,
}

impl Addressing {
    /// Path starting at the purpose level.
    pub fn from_purpose(path: Vec<u32>) -> Self {
        Self {
            path,
            start_level: level::PURPOSE,
        }
    }

    /// Full path of an address key below a CIP-1852 or BIP44 account.
    pub fn address(purpose: u32, account: u32, chain: u32, index: u32) -> Self {
        Self::from_purpose(vec![purpose, COIN_TYPE, harden(account), chain, index])
    }

    /// Staking key path of the account this addressing belongs to.
    ///
    /// Returns `None` unless the path reaches at least the account level of
    /// a CIP-1852 account.
    pub fn staking_key(&self) -> Option<Addressing> {
        if self.start_level != level::PURPOSE || self.path.len() < 3 {
            return None;
        }
        if self.path[0] != purpose::CIP1852 {
            return None;
        }
        Some(Self::from_purpose(vec![
            self.path[0],
            self.path[1],
            self.path[2],
            chain::STAKING,
            STAKING_KEY_INDEX,
        ]))
    }

    /// Level of the last path element.
    pub fn end_level(&self) -> u32 {
        self.start_level + self.path.len() as u32 - 1
    }

    /// Render as `m/1852'/1815'/0'/0/3`.
    pub fn to_path_string(&self) -> String {
        let mut s = String::from("m");
        for &i in &self.path {
            if i >= HARD_DERIVATION_START {
                s.push_str(&format!("/{}'", i - HARD_DERIVATION_START));
            } else {
                s.push_str(&format!("/{}", i));
            }
        }
        s
    }
}

/// Convert an index to its hardened form.
pub fn harden(index: u32) -> u32 {
    index | HARD_DERIVATION_START
}

pub fn is_hardened(index: u32) -> bool {
    index >= HARD_DERIVATION_START
}

/// Address kinds distinguished by the header nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// Payment key or script + stake key or script.
    Base,
    Pointer,
    Enterprise,
    Reward,
    Byron,
}

/// Decoded header of a raw address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressHeader {
    pub kind: AddressKind,
    /// Raw header type nibble (0..=15).
    pub type_nibble: u8,
    /// Network id nibble; meaningless for Byron.
    pub network_id: u8,
}

impl AddressHeader {
    /// True when the payment part is a script hash.
    pub fn payment_is_script(&self) -> bool {
        matches!(self.type_nibble, 1 | 3 | 5 | 7)
    }

    /// True when the stake part is a script hash (base and reward only).
    pub fn stake_is_script(&self) -> bool {
        matches!(self.type_nibble, 2 | 3 | 15)
    }
}

/// Inspect the header byte of a hex-encoded raw address.
pub fn parse_header(address_hex: &str) -> Result<AddressHeader, TypesError> {
    let bytes = hex::decode(address_hex)?;
    let header = *bytes
        .first()
        .ok_or_else(|| TypesError::InvalidAddress("empty address".into()))?;
    let type_nibble = header >> 4;
    let kind = match type_nibble {
        0..=3 => AddressKind::Base,
        4 | 5 => AddressKind::Pointer,
        6 | 7 => AddressKind::Enterprise,
        8 => AddressKind::Byron,
        14 | 15 => AddressKind::Reward,
        other => {
            return Err(TypesError::InvalidAddress(format!(
                "unknown address type nibble {}",
                other
            )))
        }
    };
    Ok(AddressHeader {
        kind,
        type_nibble,
        network_id: header & 0x0f,
    })
}

pub fn address_kind(address_hex: &str) -> Result<AddressKind, TypesError> {
    parse_header(address_hex).map(|h| h.kind)
}

/// Build a key-hash reward address for `network_id`.
pub fn reward_address(network_id: u8, stake_key_hash: &[u8; KEY_HASH_SIZE]) -> String {
    let mut bytes = Vec::with_capacity(1 + KEY_HASH_SIZE);
    bytes.push(0xe0 | (network_id & 0x0f));
    bytes.extend_from_slice(stake_key_hash);
    hex::encode(bytes)
}

/// Stake credential hash carried by a reward address (hex).
pub fn reward_address_credential(reward_address_hex: &str) -> Result<String, TypesError> {
    let header = parse_header(reward_address_hex)?;
    if header.kind != AddressKind::Reward {
        return Err(TypesError::InvalidAddress(format!(
            "not a reward address: {}",
            reward_address_hex
        )));
    }
    let bytes = hex::decode(reward_address_hex)?;
    if bytes.len() != 1 + KEY_HASH_SIZE {
        return Err(TypesError::InvalidAddress(format!(
            "reward address length {}, expected {}",
            bytes.len(),
            1 + KEY_HASH_SIZE
        )));
    }
    Ok(hex::encode(&bytes[1..]))
}

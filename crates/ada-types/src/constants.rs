//! Network identifiers, derivation constants, and metadata labels.
//!
//! Reference: CIP-1852 (HD wallets), CIP-19 (address headers), CIP-15 (vote
//! registration metadata).

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Types
// =============================================================================

/// Network type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
}

impl Network {
    /// Network id carried in Shelley address headers and transaction bodies.
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preprod | Network::Preview => 0,
        }
    }

    /// Protocol magic used by Byron addresses and hardware signing requests.
    pub fn protocol_magic(&self) -> u32 {
        match self {
            Network::Mainnet => 764_824_073,
            Network::Preprod => 1,
            Network::Preview => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Network {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "preprod" => Ok(Self::Preprod),
            "preview" => Ok(Self::Preview),
            _ => Err(format!("unknown network: {} (use mainnet, preprod, or preview)", s)),
        }
    }
}

// =============================================================================
// BIP32 Derivation
// =============================================================================

/// First hardened child index.
pub const HARD_DERIVATION_START: u32 = 0x8000_0000;

/// Purpose levels.
pub mod purpose {
    use super::HARD_DERIVATION_START;

    /// Byron-era (Icarus) accounts.
    pub const BIP44: u32 = HARD_DERIVATION_START + 44;
    /// Shelley-era accounts.
    pub const CIP1852: u32 = HARD_DERIVATION_START + 1852;
}

/// SLIP-44 coin type for ada.
pub const COIN_TYPE: u32 = HARD_DERIVATION_START + 1815;

/// Chain (role) indices below an account.
pub mod chain {
    pub const EXTERNAL: u32 = 0;
    pub const INTERNAL: u32 = 1;
    pub const STAKING: u32 = 2;
}

/// Index of the single staking key below the staking chain.
pub const STAKING_KEY_INDEX: u32 = 0;

/// Derivation levels as counted by `Addressing::start_level`.
pub mod level {
    pub const ROOT: u32 = 0;
    pub const PURPOSE: u32 = 1;
    pub const COIN_TYPE: u32 = 2;
    pub const ACCOUNT: u32 = 3;
    pub const CHAIN: u32 = 4;
    pub const ADDRESS: u32 = 5;
}

/// Number of consecutive unused addresses that closes a chain.
pub const DEFAULT_GAP_LIMIT: u32 = 20;

/// Addresses generated and queried per oracle round.
pub const DEFAULT_SCAN_BATCH_SIZE: u32 = 20;

// =============================================================================
// Transaction Defaults
// =============================================================================

/// Slots added to the current absolute slot to form a transaction TTL.
pub const DEFAULT_TTL_OFFSET: u64 = 7200;

/// Length of a key or script hash (Blake2b-224) in bytes.
pub const KEY_HASH_SIZE: usize = 28;

/// Length of a transaction hash (Blake2b-256) in bytes.
pub const TX_HASH_SIZE: usize = 32;

// =============================================================================
// Metadata Labels
// =============================================================================

pub mod metadata_label {
    /// CIP-25 NFT metadata, the default tag for mint metadata.
    pub const NFT: u64 = 721;
    /// CIP-15 vote registration data.
    pub const VOTING_REGISTRATION: u64 = 61284;
    /// CIP-15 vote registration signature.
    pub const VOTING_SIGNATURE: u64 = 61285;
}

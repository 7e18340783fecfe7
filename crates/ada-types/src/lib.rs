//! Core types and constants for the ada wallet backend.
//!
//! This crate provides the foundational types used across all wallet crates:
//! the multi-asset value model, network constants and configuration,
//! BIP32 addressing, address header inspection, and UTXO records.

pub mod address;
pub mod constants;
pub mod error;
pub mod multi_token;
pub mod params;
pub mod utxo;

pub use address::{AddressKind, Addressing};
pub use constants::Network;
pub use error::TypesError;
pub use multi_token::{MultiToken, TokenEntry};
pub use params::{LinearFee, NetworkConfig, ProtocolParameters};
pub use utxo::{AddressedUtxo, Utxo, UtxoId};

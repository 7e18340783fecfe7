//! Unspent output records.

use crate::address::Addressing;
use crate::constants::TX_HASH_SIZE;
use crate::error::TypesError;
use crate::multi_token::MultiToken;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an output: `(tx_hash, output_index)`.
///
/// The string form is the hash hex immediately followed by the decimal index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoId {
    pub tx_hash: String,
    pub index: u32,
}

impl UtxoId {
    pub fn new(tx_hash: impl Into<String>, index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            index,
        }
    }

    /// Parse the concatenated `txHash ++ index` form.
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        let hash_len = TX_HASH_SIZE * 2;
        if s.len() <= hash_len || !s.is_char_boundary(hash_len) {
            return Err(TypesError::InvalidUtxoId(s.to_string()));
        }
        let (hash, index) = s.split_at(hash_len);
        if hex::decode(hash).is_err() {
            return Err(TypesError::InvalidUtxoId(s.to_string()));
        }
        let index = index
            .parse::<u32>()
            .map_err(|_| TypesError::InvalidUtxoId(s.to_string()))?;
        Ok(Self::new(hash.to_lowercase(), index))
    }
}

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tx_hash, self.index)
    }
}

/// An unspent output as reported by the chain view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub address: String,
    pub amount: MultiToken,
}

impl Utxo {
    pub fn id(&self) -> UtxoId {
        UtxoId::new(self.tx_hash.clone(), self.output_index)
    }
}

/// A UTXO the wallet controls, with the path of its signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressedUtxo {
    #[serde(flatten)]
    pub utxo: Utxo,
    pub addressing: Addressing,
}

impl AddressedUtxo {
    pub fn new(utxo: Utxo, addressing: Addressing) -> Self {
        Self { utxo, addressing }
    }

    pub fn id(&self) -> UtxoId {
        self.utxo.id()
    }

    pub fn amount(&self) -> &MultiToken {
        &self.utxo.amount
    }

    pub fn address(&self) -> &str {
        &self.utxo.address
    }
}

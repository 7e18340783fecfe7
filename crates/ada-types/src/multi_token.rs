//! Multi-asset value model.
//!
//! A `MultiToken` maps asset identifiers to signed arbitrary-precision
//! amounts. The empty identifier is the network's native token (lovelace),
//! every other identifier is `policyIdHex.assetNameHex`.
//!
//! Amounts may go negative: subtraction is how callers detect shortfalls, and
//! the model never rejects a negative result. Zero entries are pruned, and
//! equality compares the pruned entry set.

use crate::error::TypesError;
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of the native token.
pub const DEFAULT_IDENTIFIER: &str = "";

/// One `(identifier, amount)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub identifier: String,
    pub network_id: u8,
    pub amount: BigInt,
}

impl TokenEntry {
    pub fn new(identifier: impl Into<String>, network_id: u8, amount: impl Into<BigInt>) -> Self {
        Self {
            identifier: identifier.into(),
            network_id,
            amount: amount.into(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.identifier == DEFAULT_IDENTIFIER
    }

    /// Split a non-default identifier into `(policy_id, asset_name)`.
    pub fn policy_and_name(&self) -> Option<(&str, &str)> {
        split_identifier(&self.identifier)
    }
}

/// Split `policyId.assetName` into its two hex parts.
///
/// Returns `None` for the default identifier. An identifier without a dot is
/// a policy with an empty asset name.
pub fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    if identifier == DEFAULT_IDENTIFIER {
        return None;
    }
    Some(identifier.split_once('.').unwrap_or((identifier, "")))
}

/// Build an identifier from a policy id and asset name (both hex).
pub fn make_identifier(policy_id: &str, asset_name: &str) -> String {
    format!("{}.{}", policy_id, asset_name)
}

/// Multi-asset quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "MultiTokenWire", into = "MultiTokenWire")]
pub struct MultiToken {
    network_id: u8,
    amounts: BTreeMap<String, BigInt>,
}

impl MultiToken {
    /// Empty value tagged with `network_id`.
    pub fn new(network_id: u8) -> Self {
        Self {
            network_id,
            amounts: BTreeMap::new(),
        }
    }

    /// Value holding only `amount` of the native token.
    pub fn from_default(network_id: u8, amount: impl Into<BigInt>) -> Self {
        let mut v = Self::new(network_id);
        v.add(TokenEntry::new(DEFAULT_IDENTIFIER, network_id, amount));
        v
    }

    /// Build from a list of entries, summing duplicates.
    pub fn from_entries(network_id: u8, entries: impl IntoIterator<Item = TokenEntry>) -> Self {
        let mut v = Self::new(network_id);
        for entry in entries {
            v.add(entry);
        }
        v
    }

    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    /// Add an entry in place.
    pub fn add(&mut self, entry: TokenEntry) -> &mut Self {
        self.apply(entry.identifier, entry.amount);
        self
    }

    /// Subtract an entry in place.
    pub fn subtract(&mut self, entry: TokenEntry) -> &mut Self {
        self.apply(entry.identifier, -entry.amount);
        self
    }

    fn apply(&mut self, identifier: String, delta: BigInt) {
        let total = self.amounts.remove(&identifier).unwrap_or_default() + delta;
        if total.sign() != Sign::NoSign {
            self.amounts.insert(identifier, total);
        }
    }

    /// Return `self + other` as a fresh value.
    pub fn join_add(&self, other: &MultiToken) -> MultiToken {
        let mut result = self.clone();
        result.join_add_mutable(other);
        result
    }

    /// Return `self - other` as a fresh value.
    pub fn join_subtract(&self, other: &MultiToken) -> MultiToken {
        let mut result = self.clone();
        result.join_subtract_mutable(other);
        result
    }

    pub fn join_add_mutable(&mut self, other: &MultiToken) -> &mut Self {
        for (id, amount) in &other.amounts {
            self.apply(id.clone(), amount.clone());
        }
        self
    }

    pub fn join_subtract_mutable(&mut self, other: &MultiToken) -> &mut Self {
        for (id, amount) in &other.amounts {
            self.apply(id.clone(), -amount.clone());
        }
        self
    }

    /// Amount held for `identifier` (zero when absent).
    pub fn get(&self, identifier: &str) -> BigInt {
        self.amounts.get(identifier).cloned().unwrap_or_default()
    }

    /// Native token amount.
    pub fn get_default(&self) -> BigInt {
        self.get(DEFAULT_IDENTIFIER)
    }

    pub fn default_entry(&self) -> TokenEntry {
        TokenEntry::new(DEFAULT_IDENTIFIER, self.network_id, self.get_default())
    }

    /// Every entry except the native token, in identifier order.
    pub fn non_default_entries(&self) -> Vec<TokenEntry> {
        self.amounts
            .iter()
            .filter(|(id, _)| id.as_str() != DEFAULT_IDENTIFIER)
            .map(|(id, amount)| TokenEntry::new(id.clone(), self.network_id, amount.clone()))
            .collect()
    }

    /// Every nonzero entry, native token first.
    pub fn entries(&self) -> Vec<TokenEntry> {
        self.amounts
            .iter()
            .map(|(id, amount)| TokenEntry::new(id.clone(), self.network_id, amount.clone()))
            .collect()
    }

    pub fn has_non_default(&self) -> bool {
        self.amounts.keys().any(|id| id != DEFAULT_IDENTIFIER)
    }

    /// True when no entry is nonzero.
    pub fn is_zero(&self) -> bool {
        self.amounts.values().all(|v| v.sign() == Sign::NoSign)
    }

    pub fn is_empty(&self) -> bool {
        self.is_zero()
    }

    /// True if any entry is below zero.
    pub fn has_negative(&self) -> bool {
        self.amounts.values().any(|v| v.sign() == Sign::Minus)
    }

    /// Identifiers whose amount is below zero.
    pub fn negative_identifiers(&self) -> Vec<String> {
        self.amounts
            .iter()
            .filter(|(_, v)| v.sign() == Sign::Minus)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Keep only the entries whose amount is above zero.
    pub fn positive_part(&self) -> MultiToken {
        MultiToken {
            network_id: self.network_id,
            amounts: self
                .amounts
                .iter()
                .filter(|(_, v)| v.sign() == Sign::Plus)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Native token amount as `u64`. Fails when negative or out of range.
    pub fn default_u64(&self) -> Result<u64, TypesError> {
        u64::try_from(&self.get_default())
            .map_err(|_| TypesError::InvalidAmount(self.get_default().to_string()))
    }
}

impl PartialEq for MultiToken {
    fn eq(&self, other: &Self) -> bool {
        let a = self.amounts.iter().filter(|(_, v)| v.sign() != Sign::NoSign);
        let b = other.amounts.iter().filter(|(_, v)| v.sign() != Sign::NoSign);
        a.eq(b)
    }
}

impl Eq for MultiToken {}

// ─── Wire form ──────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiTokenWire {
    #[serde(default)]
    network_id: u8,
    values: Vec<TokenEntryWire>,
}

#[derive(Serialize, Deserialize)]
struct TokenEntryWire {
    identifier: String,
    #[serde(with = "bigint_string")]
    amount: BigInt,
}

impl From<MultiTokenWire> for MultiToken {
    fn from(w: MultiTokenWire) -> Self {
        let network_id = w.network_id;
        MultiToken::from_entries(
            network_id,
            w.values
                .into_iter()
                .map(|e| TokenEntry::new(e.identifier, network_id, e.amount)),
        )
    }
}

impl From<MultiToken> for MultiTokenWire {
    fn from(v: MultiToken) -> Self {
        MultiTokenWire {
            network_id: v.network_id,
            values: v
                .amounts
                .into_iter()
                .map(|(identifier, amount)| TokenEntryWire { identifier, amount })
                .collect(),
        }
    }
}

/// Serialize `BigInt` as a decimal string.
pub mod bigint_string {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigInt, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

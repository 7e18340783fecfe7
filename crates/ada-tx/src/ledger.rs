//! Ledger library capability.
//!
//! The assembler never serializes, sizes, or hashes a transaction itself. It
//! drives a `TxBuilder` obtained from an injected `LedgerLib`, which owns the
//! binary encoding, the fee formula evaluation, and the minimum-ada rule.

use crate::certificate::Certificate;
use crate::metadata::AuxiliaryData;
use crate::TxError;
use ada_types::{MultiToken, ProtocolParameters};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Policy id -> asset name -> signed quantity (negative burns).
pub type MintAssets = BTreeMap<String, BTreeMap<String, BigInt>>;

/// An input handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub tx_hash: String,
    pub index: u32,
    pub address: String,
    pub amount: MultiToken,
}

/// An output handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub address: String,
    pub amount: MultiToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub reward_address: String,
    pub amount: u64,
}

/// Finalized transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxBody {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_start: Option<u64>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(default, with = "mint_serde")]
    pub mint: MintAssets,
    #[serde(default)]
    pub required_signers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_data_hash: Option<String>,
    pub network_id: u8,
}

/// Result of `TxBuilder::build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTx {
    pub body: TxBody,
    pub fee: u64,
    /// Transaction id (hex).
    pub hash: String,
    /// Estimated size of the signed transaction in bytes.
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_data: Option<AuxiliaryData>,
}

/// Entry point of the ledger library.
pub trait LedgerLib {
    type Builder: TxBuilder;

    fn new_builder(&self, params: &ProtocolParameters) -> Self::Builder;

    fn hash_transaction(&self, body: &TxBody) -> String;

    fn hash_auxiliary_data(&self, aux: &AuxiliaryData) -> String;
}

/// Transaction-in-progress.
pub trait TxBuilder {
    fn add_input(&mut self, input: &TxInput) -> Result<(), TxError>;

    fn add_output(&mut self, output: &TxOutput) -> Result<(), TxError>;

    fn add_certificate(&mut self, cert: &Certificate) -> Result<(), TxError>;

    fn add_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<(), TxError>;

    fn set_mint(&mut self, mint: &MintAssets) -> Result<(), TxError>;

    fn set_auxiliary_data(&mut self, aux: &AuxiliaryData) -> Result<(), TxError>;

    fn set_ttl(&mut self, slot: u64);

    fn set_validity_start(&mut self, slot: u64);

    fn add_required_signer(&mut self, key_hash: &str) -> Result<(), TxError>;

    /// Fee increase caused by adding `input` to the current body.
    fn fee_for_input(&self, input: &TxInput) -> u64;

    /// Fee increase caused by adding `output` to the current body.
    fn fee_for_output(&self, output: &TxOutput) -> u64;

    /// Minimum fee of the body as it stands.
    fn min_fee(&self) -> u64;

    /// Minimum lovelace an output holding `value` must carry.
    fn min_ada_required(&self, value: &MultiToken, has_data_hash: bool) -> u64;

    fn set_fee(&mut self, fee: u64);

    fn build(&self) -> Result<BuiltTx, TxError>;
}

mod mint_serde {
    use super::MintAssets;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(mint: &MintAssets, s: S) -> Result<S::Ok, S::Error> {
        let as_strings: BTreeMap<&String, BTreeMap<&String, String>> = mint
            .iter()
            .map(|(p, assets)| (p, assets.iter().map(|(a, q)| (a, q.to_string())).collect()))
            .collect();
        as_strings.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<MintAssets, D::Error> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::deserialize(d)?;
        raw.into_iter()
            .map(|(p, assets)| {
                let parsed = assets
                    .into_iter()
                    .map(|(a, q)| q.parse().map(|q| (a, q)).map_err(serde::de::Error::custom))
                    .collect::<Result<_, _>>()?;
                Ok((p, parsed))
            })
            .collect()
    }
}

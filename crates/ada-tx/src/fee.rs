//! Size estimation and the reference ledger.
//!
//! `EstimatingLedger` implements `LedgerLib` without a binary encoder: it
//! estimates the serialized size of the signed transaction structurally
//! (inputs, outputs, witnesses, certificates, auxiliary data) and evaluates
//! the linear fee and the per-byte minimum-ada rule over that estimate.
//! Hashes are Blake2b-256 over a canonical JSON rendering of the body.

use crate::certificate::Certificate;
use crate::ledger::{BuiltTx, LedgerLib, MintAssets, TxBody, TxBuilder, TxInput, TxOutput, Withdrawal};
use crate::metadata::AuxiliaryData;
use crate::TxError;
use ada_types::multi_token::make_identifier;
use ada_types::{MultiToken, ProtocolParameters};
use num_bigint::{BigInt, Sign};
use std::collections::{BTreeMap, BTreeSet};

/// Overhead the ledger charges every UTxO entry on top of its encoding.
pub const UTXO_ENTRY_OVERHEAD: usize = 160;

/// Address length used when sizing an output for the minimum-ada rule.
pub const NOMINAL_ADDRESS_SIZE: usize = 57;

/// Vkey witness: 32-byte key + 64-byte signature + framing.
pub const VKEY_WITNESS_SIZE: usize = 101;

// ─── Structural size helpers ─────────────────────────────────────────────────

/// Encoded size of a value bundle.
pub fn value_size(value: &MultiToken) -> usize {
    let coin = 9;
    if !value.has_non_default() {
        return coin;
    }
    let mut policies: BTreeMap<&str, usize> = BTreeMap::new();
    let tokens = value.non_default_entries();
    for t in &tokens {
        if let Some((policy, name)) = t.policy_and_name() {
            // map key + quantity
            *policies.entry(policy).or_default() += 2 + name.len() / 2 + 9;
        }
    }
    let assets: usize = policies.values().sum();
    // array header + coin + multiasset map header + per-policy (hash + map header)
    1 + coin + 3 + policies.len() * (28 + 3) + assets
}

/// Encoded size of an output whose address is `address_bytes` long.
pub fn output_size(address_bytes: usize, value: &MultiToken, has_data_hash: bool) -> usize {
    let mut size = 1 + 2 + address_bytes + value_size(value);
    if has_data_hash {
        size += 34;
    }
    size
}

fn address_len(address_hex: &str) -> usize {
    address_hex.len() / 2
}

fn input_size() -> usize {
    // array header + tx hash + index
    1 + 34 + 3
}

fn certificate_size(cert: &Certificate) -> usize {
    match cert {
        Certificate::StakeRegistration { .. } | Certificate::StakeDeregistration { .. } => 1 + 1 + 32 + 3,
        Certificate::StakeDelegation { .. } => 1 + 1 + 32 + 3 + 30,
    }
}

fn mint_size(mint: &MintAssets) -> usize {
    if mint.is_empty() {
        return 0;
    }
    let mut size = 1 + 3;
    for assets in mint.values() {
        size += 31 + 3;
        for name in assets.keys() {
            size += 2 + name.len() / 2 + 9;
        }
    }
    size
}

/// Blake2b digest of `data` with a `len`-byte output, hex encoded.
pub fn blake2b_hex(data: &[u8], len: usize) -> String {
    let hash = blake2b_simd::Params::new().hash_length(len).hash(data);
    hex::encode(hash.as_bytes())
}

// ─── Reference ledger ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingLedger;

impl EstimatingLedger {
    pub fn new() -> Self {
        Self
    }
}

impl LedgerLib for EstimatingLedger {
    type Builder = EstimatingBuilder;

    fn new_builder(&self, params: &ProtocolParameters) -> EstimatingBuilder {
        EstimatingBuilder::new(params.clone())
    }

    fn hash_transaction(&self, body: &TxBody) -> String {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        blake2b_hex(&bytes, 32)
    }

    fn hash_auxiliary_data(&self, aux: &AuxiliaryData) -> String {
        blake2b_hex(&aux.canonical_bytes(), 32)
    }
}

/// Builder state kept by `EstimatingLedger`.
#[derive(Debug, Clone)]
pub struct EstimatingBuilder {
    params: ProtocolParameters,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    certificates: Vec<Certificate>,
    withdrawals: Vec<Withdrawal>,
    mint: MintAssets,
    aux: Option<AuxiliaryData>,
    ttl: Option<u64>,
    validity_start: Option<u64>,
    required_signers: BTreeSet<String>,
    fee: u64,
}

impl EstimatingBuilder {
    pub fn new(params: ProtocolParameters) -> Self {
        Self {
            params,
            inputs: Vec::new(),
            outputs: Vec::new(),
            certificates: Vec::new(),
            withdrawals: Vec::new(),
            mint: MintAssets::new(),
            aux: None,
            ttl: None,
            validity_start: None,
            required_signers: BTreeSet::new(),
            fee: 0,
        }
    }

    /// Distinct keys that will have to sign.
    fn witness_count(&self) -> usize {
        let mut keys: BTreeSet<&str> = self.inputs.iter().map(|i| i.address.as_str()).collect();
        for c in &self.certificates {
            if c.needs_witness() {
                keys.insert(c.credential().hash());
            }
        }
        for w in &self.withdrawals {
            keys.insert(w.reward_address.as_str());
        }
        for s in &self.required_signers {
            keys.insert(s.as_str());
        }
        keys.len()
    }

    /// Estimated size of the signed transaction.
    pub fn estimate_size(&self) -> usize {
        // tx array header + body map header + fee + ttl + witness set header + validity flag
        let mut size = 1 + 1 + 9 + 1;
        size += 3 + self.inputs.len() * input_size();
        size += 3;
        size += self
            .outputs
            .iter()
            .map(|o| output_size(address_len(&o.address), &o.amount, o.data_hash.is_some()))
            .sum::<usize>();
        if self.ttl.is_some() {
            size += 9;
        }
        if self.validity_start.is_some() {
            size += 9;
        }
        if !self.certificates.is_empty() {
            size += 3 + self.certificates.iter().map(certificate_size).sum::<usize>();
        }
        if !self.withdrawals.is_empty() {
            size += 3 + self.withdrawals.len() * (2 + 29 + 9);
        }
        size += mint_size(&self.mint);
        if !self.required_signers.is_empty() {
            size += 3 + self.required_signers.len() * 30;
        }

        size += 1 + 3 + self.witness_count() * VKEY_WITNESS_SIZE;

        match &self.aux {
            Some(aux) if !aux.is_empty() => size += 34 + aux.canonical_bytes().len(),
            _ => size += 1,
        }
        size
    }

    fn network_id(&self) -> u8 {
        self.params.network_id
    }

    fn mint_value(&self) -> MultiToken {
        let mut value = MultiToken::new(self.network_id());
        for (policy, assets) in &self.mint {
            for (name, qty) in assets {
                value.add(ada_types::TokenEntry::new(
                    make_identifier(policy, name),
                    self.network_id(),
                    qty.clone(),
                ));
            }
        }
        value
    }

    /// `inputs + withdrawals + refunds + mint - outputs - fee - deposits`.
    pub fn balance(&self) -> MultiToken {
        let net = self.network_id();
        let mut balance = MultiToken::new(net);
        for i in &self.inputs {
            balance.join_add_mutable(&i.amount);
        }
        let implicit: u64 = self.withdrawals.iter().map(|w| w.amount).sum::<u64>()
            + self.certificates.iter().map(|c| c.refund(&self.params)).sum::<u64>();
        balance.join_add_mutable(&MultiToken::from_default(net, implicit));
        balance.join_add_mutable(&self.mint_value());
        for o in &self.outputs {
            balance.join_subtract_mutable(&o.amount);
        }
        let consumed: u64 = self.fee + self.certificates.iter().map(|c| c.deposit(&self.params)).sum::<u64>();
        balance.join_subtract_mutable(&MultiToken::from_default(net, consumed));
        balance
    }
}

impl TxBuilder for EstimatingBuilder {
    fn add_input(&mut self, input: &TxInput) -> Result<(), TxError> {
        if self
            .inputs
            .iter()
            .any(|i| i.tx_hash == input.tx_hash && i.index == input.index)
        {
            return Err(TxError::Ledger(format!(
                "input {}{} added twice",
                input.tx_hash, input.index
            )));
        }
        self.inputs.push(input.clone());
        Ok(())
    }

    fn add_output(&mut self, output: &TxOutput) -> Result<(), TxError> {
        if output.amount.has_negative() {
            return Err(TxError::Ledger("output carries a negative amount".into()));
        }
        let size = value_size(&output.amount);
        if size > self.params.max_value_size as usize {
            return Err(TxError::Ledger(format!(
                "output value of {} bytes exceeds max value size {}",
                size, self.params.max_value_size
            )));
        }
        self.outputs.push(output.clone());
        Ok(())
    }

    fn add_certificate(&mut self, cert: &Certificate) -> Result<(), TxError> {
        self.certificates.push(cert.clone());
        Ok(())
    }

    fn add_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<(), TxError> {
        if self
            .withdrawals
            .iter()
            .any(|w| w.reward_address == withdrawal.reward_address)
        {
            return Err(TxError::Ledger(format!(
                "duplicate withdrawal from {}",
                withdrawal.reward_address
            )));
        }
        self.withdrawals.push(withdrawal.clone());
        Ok(())
    }

    fn set_mint(&mut self, mint: &MintAssets) -> Result<(), TxError> {
        for assets in mint.values() {
            if assets.values().any(|q| q.sign() == Sign::NoSign) {
                return Err(TxError::Ledger("mint entry with zero quantity".into()));
            }
        }
        self.mint = mint.clone();
        Ok(())
    }

    fn set_auxiliary_data(&mut self, aux: &AuxiliaryData) -> Result<(), TxError> {
        self.aux = Some(aux.clone());
        Ok(())
    }

    fn set_ttl(&mut self, slot: u64) {
        self.ttl = Some(slot);
    }

    fn set_validity_start(&mut self, slot: u64) {
        self.validity_start = Some(slot);
    }

    fn add_required_signer(&mut self, key_hash: &str) -> Result<(), TxError> {
        if key_hash.len() != 56 || hex::decode(key_hash).is_err() {
            return Err(TxError::Ledger(format!("bad required signer {}", key_hash)));
        }
        self.required_signers.insert(key_hash.to_string());
        Ok(())
    }

    fn fee_for_input(&self, input: &TxInput) -> u64 {
        let mut next = self.clone();
        next.inputs.push(input.clone());
        next.min_fee().saturating_sub(self.min_fee())
    }

    fn fee_for_output(&self, output: &TxOutput) -> u64 {
        let mut next = self.clone();
        next.outputs.push(output.clone());
        next.min_fee().saturating_sub(self.min_fee())
    }

    fn min_fee(&self) -> u64 {
        self.params.linear_fee.fee_for_size(self.estimate_size())
    }

    fn min_ada_required(&self, value: &MultiToken, has_data_hash: bool) -> u64 {
        let size = UTXO_ENTRY_OVERHEAD + output_size(NOMINAL_ADDRESS_SIZE, value, has_data_hash);
        (size as u64).saturating_mul(self.params.coins_per_utxo_byte)
    }

    fn set_fee(&mut self, fee: u64) {
        self.fee = fee;
    }

    fn build(&self) -> Result<BuiltTx, TxError> {
        if self.inputs.is_empty() {
            return Err(TxError::Ledger("transaction has no inputs".into()));
        }
        let min = self.min_fee();
        if self.fee < min {
            return Err(TxError::Ledger(format!("fee {} below minimum {}", self.fee, min)));
        }
        let balance = self.balance();
        if !balance.is_zero() {
            return Err(TxError::Ledger(format!("transaction does not balance: {:?}", balance.entries())));
        }
        let size = self.estimate_size();
        if size > self.params.max_tx_size as usize {
            return Err(TxError::TooLarge {
                size,
                limit: self.params.max_tx_size,
            });
        }

        let ledger = EstimatingLedger;
        let aux = self.aux.clone().filter(|a| !a.is_empty());
        let body = TxBody {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            fee: self.fee,
            ttl: self.ttl,
            validity_start: self.validity_start,
            certificates: self.certificates.clone(),
            withdrawals: self.withdrawals.clone(),
            mint: self.mint.clone(),
            required_signers: self.required_signers.iter().cloned().collect(),
            auxiliary_data_hash: aux.as_ref().map(|a| ledger.hash_auxiliary_data(a)),
            network_id: self.network_id(),
        };
        let hash = ledger.hash_transaction(&body);
        Ok(BuiltTx {
            body,
            fee: self.fee,
            hash,
            size,
            auxiliary_data: aux,
        })
    }
}

/// Lovelace of `value` clamped to `u64`, zero when negative.
pub fn lovelace(value: &MultiToken) -> u64 {
    let v: BigInt = value.get_default();
    u64::try_from(&v).unwrap_or(0)
}

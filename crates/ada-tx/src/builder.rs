//! Incremental transaction assembly.
//!
//! Every request shape (send-all, targeted send, connector build) is turned
//! into a `BuildPlan` and funneled through `Assembler::build`, which drives
//! the injected ledger library: fixed parts first (certificates, withdrawals,
//! mint, metadata, outputs, must-include inputs), then candidate coins one at
//! a time until the body balances with a valid change decision.
//!
//! Balance relation enforced on every result:
//! `inputs + withdrawals + refunds + mint == outputs + change + fee + deposits`.

use crate::certificate::Certificate;
use crate::ledger::{BuiltTx, LedgerLib, MintAssets, TxBuilder, TxInput, TxOutput, Withdrawal};
use crate::metadata::{mint_metadata, AuxiliaryData, MintTag};
use crate::selection::{classify, order_candidates, AddInputResult, SelectionStrategy};
use crate::TxError;
use ada_types::address::reward_address_credential;
use ada_types::multi_token::{bigint_string, make_identifier};
use ada_types::{AddressedUtxo, Addressing, MultiToken, ProtocolParameters, TokenEntry, Utxo, UtxoId};
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

// ─── Request types ───────────────────────────────────────────────────────────

/// Tokens minted straight into one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub policy_id: String,
    pub asset_name: String,
    #[serde(with = "bigint_string")]
    pub amount: BigInt,
}

impl MintRequest {
    pub fn identifier(&self) -> String {
        make_identifier(&self.policy_id, &self.asset_name)
    }
}

/// A receiver and the value it should get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTarget {
    pub address: String,
    pub value: MultiToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    /// Raise the lovelace to the ledger minimum if the value is short.
    #[serde(default)]
    pub ensure_min_value: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mint: Vec<MintRequest>,
}

impl OutputTarget {
    pub fn new(address: impl Into<String>, value: MultiToken) -> Self {
        Self {
            address: address.into(),
            value,
            data_hash: None,
            ensure_min_value: false,
            mint: Vec::new(),
        }
    }

    pub fn ensure_min_value(mut self) -> Self {
        self.ensure_min_value = true;
        self
    }

    pub fn with_data_hash(mut self, hash: impl Into<String>) -> Self {
        self.data_hash = Some(hash.into());
        self
    }

    pub fn with_mint(mut self, mint: MintRequest) -> Self {
        self.mint.push(mint);
        self
    }

    fn carries_tokens(&self) -> bool {
        self.value.has_non_default() || !self.mint.is_empty()
    }
}

/// Where leftover value goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReceiver {
    pub address: String,
    pub addressing: Addressing,
}

/// An input the caller insists on spending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum InputSource {
    /// Owned by the wallet, signed with `addressing`.
    Owned(AddressedUtxo),
    /// Resolved from the chain, witnessed by someone else.
    Foreign(Utxo),
}

impl InputSource {
    pub fn utxo(&self) -> &Utxo {
        match self {
            InputSource::Owned(u) => &u.utxo,
            InputSource::Foreign(u) => u,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildKind {
    /// Exactly one receiver gets everything minus the fee.
    SendAll,
    /// Explicit receivers plus one change receiver.
    #[default]
    Targeted,
    /// dApp-connector build with explicit inputs and raw outputs.
    Connector,
}

/// Everything one build needs.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub kind: BuildKind,
    pub must_include: Vec<InputSource>,
    pub candidates: Vec<AddressedUtxo>,
    pub outputs: Vec<OutputTarget>,
    pub change: Vec<ChangeReceiver>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
    pub auxiliary_data: Option<AuxiliaryData>,
    pub mint_tags: Vec<MintTag>,
    /// Mint or burn entries not aimed at a specific output.
    pub mint: Vec<MintRequest>,
    pub required_signers: Vec<String>,
    pub ttl: Option<u64>,
    pub validity_start: Option<u64>,
    /// Allow a connector build with no outputs.
    pub only_inputs_intended: bool,
    pub strategy: SelectionStrategy,
    pub staking_addressing: Option<Addressing>,
}

// ─── Result types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    pub vkey: String,
    pub signature: String,
}

/// Stake key hashes the signing stage must cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeededStakingKeyHashes {
    pub required: BTreeSet<String>,
    pub gathered: BTreeSet<Witness>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOutput {
    pub address: String,
    pub addressing: Addressing,
    pub value: MultiToken,
}

/// Assembled, unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub sender_utxos: Vec<AddressedUtxo>,
    #[serde(default)]
    pub foreign_inputs: Vec<Utxo>,
    pub built: BuiltTx,
    /// Empty when the build consumed exactly to zero.
    pub change: Vec<ChangeOutput>,
    pub needed_staking_key_hashes: NeededStakingKeyHashes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AuxiliaryData>,
    pub protocol_params: ProtocolParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking_addressing: Option<Addressing>,
}

impl UnsignedTx {
    pub fn fee(&self) -> u64 {
        self.built.fee
    }

    pub fn tx_hash(&self) -> &str {
        &self.built.hash
    }

    pub fn change_address(&self) -> Option<&str> {
        self.change.first().map(|c| c.address.as_str())
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.built.body.certificates
    }

    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.built.body.withdrawals
    }

    /// Sum of all explicit inputs.
    pub fn total_input(&self) -> MultiToken {
        let mut total = MultiToken::new(self.protocol_params.network_id);
        for i in &self.built.body.inputs {
            total.join_add_mutable(&i.amount);
        }
        total
    }

    /// Sum of all outputs, change included.
    pub fn total_output(&self) -> MultiToken {
        let mut total = MultiToken::new(self.protocol_params.network_id);
        for o in &self.built.body.outputs {
            total.join_add_mutable(&o.amount);
        }
        total
    }

    /// Addressing of the change output paying to `address`, if any.
    pub fn change_addressing(&self, address: &str) -> Option<&Addressing> {
        self.change
            .iter()
            .find(|c| c.address == address)
            .map(|c| &c.addressing)
    }
}

// ─── Assembler ───────────────────────────────────────────────────────────────

fn to_input(utxo: &Utxo) -> TxInput {
    TxInput {
        tx_hash: utxo.tx_hash.clone(),
        index: utxo.output_index,
        address: utxo.address.clone(),
        amount: utxo.amount.clone(),
    }
}

fn lovelace_u64(value: &BigInt) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Change decision for the current input set.
enum Settlement {
    /// Leftover lovelace absorbed into the fee.
    NoChange { fee: u64 },
    WithChange { fee: u64, value: MultiToken },
}

pub struct Assembler<'a, L: LedgerLib> {
    ledger: &'a L,
    params: &'a ProtocolParameters,
}

impl<'a, L: LedgerLib> Assembler<'a, L> {
    pub fn new(ledger: &'a L, params: &'a ProtocolParameters) -> Self {
        Self { ledger, params }
    }

    fn net(&self) -> u8 {
        self.params.network_id
    }

    /// Build the transaction described by `plan`.
    pub fn build(&self, plan: BuildPlan) -> Result<UnsignedTx, TxError> {
        self.validate(&plan)?;
        let net = self.net();
        let mut builder = self.ledger.new_builder(self.params);

        if let Some(slot) = plan.ttl {
            builder.set_ttl(slot);
        }
        if let Some(slot) = plan.validity_start {
            builder.set_validity_start(slot);
        }

        // Value fixed by the request itself, independent of inputs.
        let mut fixed_in = MultiToken::new(net);
        let mut fixed_out = MultiToken::new(net);

        let mut required = BTreeSet::new();
        for cert in &plan.certificates {
            builder.add_certificate(cert)?;
            if let Some(h) = cert.credential().key_hash() {
                required.insert(h.to_string());
            }
            fixed_out.add(TokenEntry::new("", net, cert.deposit(self.params)));
            fixed_in.add(TokenEntry::new("", net, cert.refund(self.params)));
        }
        for w in &plan.withdrawals {
            builder.add_withdrawal(w)?;
            required.insert(reward_address_credential(&w.reward_address)?);
            fixed_in.add(TokenEntry::new("", net, w.amount));
        }
        for signer in &plan.required_signers {
            builder.add_required_signer(signer)?;
        }

        // Mint: fold targeted requests into their outputs, consolidate all.
        let mut mint = MintAssets::new();
        let mut outputs = Vec::with_capacity(plan.outputs.len());
        for target in &plan.outputs {
            let mut value = target.value.clone();
            for m in &target.mint {
                if m.amount.sign() != Sign::Plus {
                    return Err(TxError::InvalidRequest(format!(
                        "mint into output {} must be positive",
                        target.address
                    )));
                }
                value.add(TokenEntry::new(m.identifier(), net, m.amount.clone()));
                add_mint(&mut mint, m);
            }
            outputs.push((target, value));
        }
        for m in &plan.mint {
            add_mint(&mut mint, m);
        }
        if !mint.is_empty() {
            builder.set_mint(&mint)?;
            for (policy, assets) in &mint {
                for (name, qty) in assets {
                    fixed_in.add(TokenEntry::new(make_identifier(policy, name), net, qty.clone()));
                }
            }
        }

        let mut aux = plan.auxiliary_data.clone().unwrap_or_default();
        if !plan.mint_tags.is_empty() {
            aux.merge(mint_metadata(&plan.mint_tags)?)?;
        }
        if !aux.is_empty() {
            builder.set_auxiliary_data(&aux)?;
        }

        let mut sender_utxos = Vec::new();
        let mut foreign_inputs = Vec::new();
        let mut have = MultiToken::new(net);
        let mut spent: HashSet<UtxoId> = HashSet::new();
        for source in &plan.must_include {
            let utxo = source.utxo();
            if !spent.insert(utxo.id()) {
                return Err(TxError::InvalidRequest(format!("input {} listed twice", utxo.id())));
            }
            builder.add_input(&to_input(utxo))?;
            have.join_add_mutable(&utxo.amount);
            match source {
                InputSource::Owned(u) => sender_utxos.push(u.clone()),
                InputSource::Foreign(u) => foreign_inputs.push(u.clone()),
            }
            debug!("must-include input {} added", utxo.id());
        }

        let candidates: Vec<AddressedUtxo> = plan
            .candidates
            .iter()
            .filter(|c| !spent.contains(&c.id()))
            .cloned()
            .collect();

        let change = if plan.kind == BuildKind::SendAll {
            let (target, _) = &outputs[0];
            let receiver = target.address.clone();
            for c in &candidates {
                let input = to_input(&c.utxo);
                let marginal = builder.fee_for_input(&input);
                if !c.amount().has_non_default() && lovelace_u64(&c.amount().get_default()) <= marginal {
                    debug!("send-all skips dust input {}", c.id());
                    continue;
                }
                builder.add_input(&input)?;
                have.join_add_mutable(c.amount());
                sender_utxos.push(c.clone());
            }
            let leftover = have.join_add(&fixed_in).join_subtract(&fixed_out);
            if leftover.has_negative() {
                return Err(TxError::InsufficientFunds(format!(
                    "cannot cover {:?}",
                    leftover.negative_identifiers()
                )));
            }
            let (fee, value) = self.settle_output(&builder, &receiver, None, &leftover)?.ok_or_else(|| {
                TxError::InsufficientFunds("balance does not cover fee and minimum output".into())
            })?;
            builder.add_output(&TxOutput {
                address: receiver,
                amount: value,
                data_hash: None,
            })?;
            builder.set_fee(fee);
            Vec::new()
        } else {
            for (target, value) in outputs.iter_mut() {
                let has_hash = target.data_hash.is_some();
                let min = builder.min_ada_required(value, has_hash);
                let current = value.get_default();
                if target.ensure_min_value {
                    let diff = BigInt::from(min) - &current;
                    // zero or negative difference keeps the caller's value
                    if diff.sign() == Sign::Plus {
                        value.add(TokenEntry::new("", net, diff));
                    }
                } else if current < BigInt::from(min) {
                    return Err(TxError::OutputBelowMinimum {
                        required: min,
                        provided: current.to_string(),
                    });
                }
                builder.add_output(&TxOutput {
                    address: target.address.clone(),
                    amount: value.clone(),
                    data_hash: target.data_hash.clone(),
                })?;
                fixed_out.join_add_mutable(value);
            }

            let receiver = &plan.change[0];
            let mut remaining: VecDeque<AddressedUtxo> =
                order_candidates(&candidates, plan.strategy).into();
            let mut input_count = plan.must_include.len();
            let settlement = loop {
                let leftover = have.join_add(&fixed_in).join_subtract(&fixed_out);
                // a body needs at least one input even if withdrawals cover it
                if input_count > 0 {
                    if let Some(s) = self.settle_change(&builder, receiver, &leftover)? {
                        break s;
                    }
                }

                let missing = self.missing(&builder, &leftover);
                let pick = remaining.iter().position(|c| {
                    let marginal = builder.fee_for_input(&to_input(&c.utxo));
                    match classify(c.amount(), &missing, marginal) {
                        AddInputResult::Valid => true,
                        verdict => {
                            debug!("input {} skipped: {:?}", c.id(), verdict);
                            false
                        }
                    }
                });
                let Some(next) = pick.and_then(|i| remaining.remove(i)) else {
                    return Err(TxError::InsufficientFunds(format!(
                        "missing {:?}",
                        missing
                            .entries()
                            .iter()
                            .map(|e| format!("{}={}", e.identifier, e.amount))
                            .collect::<Vec<_>>()
                    )));
                };
                builder.add_input(&to_input(&next.utxo))?;
                have.join_add_mutable(next.amount());
                input_count += 1;
                debug!("input {} added", next.id());
                sender_utxos.push(next);
            };

            match settlement {
                Settlement::NoChange { fee } => {
                    builder.set_fee(fee);
                    Vec::new()
                }
                Settlement::WithChange { fee, value } => {
                    builder.add_output(&TxOutput {
                        address: receiver.address.clone(),
                        amount: value.clone(),
                        data_hash: None,
                    })?;
                    builder.set_fee(fee);
                    vec![ChangeOutput {
                        address: receiver.address.clone(),
                        addressing: receiver.addressing.clone(),
                        value,
                    }]
                }
            }
        };

        let built = builder.build()?;
        info!(
            "built tx {} with {} inputs, {} outputs, fee {}",
            built.hash,
            built.body.inputs.len(),
            built.body.outputs.len(),
            built.fee
        );

        Ok(UnsignedTx {
            sender_utxos,
            foreign_inputs,
            built,
            change,
            needed_staking_key_hashes: NeededStakingKeyHashes {
                required,
                gathered: BTreeSet::new(),
            },
            metadata: if aux.is_empty() { None } else { Some(aux) },
            protocol_params: self.params.clone(),
            staking_addressing: plan.staking_addressing,
        })
    }

    fn validate(&self, plan: &BuildPlan) -> Result<(), TxError> {
        match plan.kind {
            BuildKind::SendAll => {
                if plan.outputs.len() != 1 {
                    return Err(TxError::InvalidRequest(format!(
                        "send-all takes exactly one receiver, got {}",
                        plan.outputs.len()
                    )));
                }
                if !plan.change.is_empty() {
                    return Err(TxError::InvalidRequest("send-all takes no change receiver".into()));
                }
            }
            BuildKind::Targeted | BuildKind::Connector => {
                if plan.change.len() != 1 {
                    return Err(TxError::InvalidRequest(format!(
                        "expected exactly one change receiver, got {}",
                        plan.change.len()
                    )));
                }
            }
        }
        if plan.kind == BuildKind::Targeted {
            let token_targets = plan.outputs.iter().filter(|o| o.carries_tokens()).count();
            if token_targets > 1 {
                return Err(TxError::InvalidRequest(
                    "only one receiver may carry tokens per call".into(),
                ));
            }
            if plan.outputs.is_empty()
                && plan.certificates.is_empty()
                && plan.withdrawals.is_empty()
                && plan.auxiliary_data.is_none()
            {
                return Err(TxError::InvalidRequest("nothing to send".into()));
            }
        }
        if plan.kind == BuildKind::Connector && plan.outputs.is_empty() && !plan.only_inputs_intended {
            return Err(TxError::InvalidRequest(
                "no outputs and inputs-only build not requested".into(),
            ));
        }
        for o in &plan.outputs {
            if o.value.has_negative() {
                return Err(TxError::InvalidRequest(format!("negative amount for {}", o.address)));
            }
        }
        Ok(())
    }

    /// Amounts still lacking, plus the fee of the body as it stands.
    fn missing(&self, builder: &L::Builder, leftover: &MultiToken) -> MultiToken {
        let net = self.net();
        let mut short = MultiToken::new(net);
        short.join_subtract_mutable(leftover);
        short.add(TokenEntry::new("", net, builder.min_fee()));
        let missing = short.positive_part();
        if !missing.is_zero() {
            return missing;
        }
        // Fee is covered but the change output is not.
        let min = builder.min_ada_required(&leftover.positive_part(), false);
        MultiToken::from_default(net, min.max(1))
    }

    /// Try to finish with the current inputs.
    fn settle_change(
        &self,
        builder: &L::Builder,
        receiver: &ChangeReceiver,
        leftover: &MultiToken,
    ) -> Result<Option<Settlement>, TxError> {
        if leftover.has_negative() {
            return Ok(None);
        }
        let available = leftover.get_default();
        let fee_without = builder.min_fee();

        if let Some((fee, value)) = self.settle_output(builder, &receiver.address, None, leftover)? {
            return Ok(Some(Settlement::WithChange { fee, value }));
        }
        if leftover.has_non_default() {
            // tokens cannot be dropped
            return Ok(None);
        }
        if available >= BigInt::from(fee_without) {
            let fee = lovelace_u64(&available);
            debug!("absorbing {} lovelace of dust into the fee", fee - fee_without);
            return Ok(Some(Settlement::NoChange { fee }));
        }
        Ok(None)
    }

    /// Fee and value of a final output taking all of `leftover`, if it can
    /// pay the fee and still meet the minimum.
    fn settle_output(
        &self,
        builder: &L::Builder,
        address: &str,
        data_hash: Option<String>,
        leftover: &MultiToken,
    ) -> Result<Option<(u64, MultiToken)>, TxError> {
        let net = self.net();
        let available = leftover.get_default();
        if available.sign() != Sign::Plus {
            return Ok(None);
        }
        let base = builder.min_fee();
        let make = |fee: u64| {
            let mut value = leftover.clone();
            value.subtract(TokenEntry::new("", net, fee));
            TxOutput {
                address: address.to_string(),
                amount: value,
                data_hash: data_hash.clone(),
            }
        };

        let mut fee = base;
        for _ in 0..8 {
            let next = base + builder.fee_for_output(&make(fee));
            if next <= fee {
                break;
            }
            fee = next;
        }
        if available < BigInt::from(fee) {
            return Ok(None);
        }
        let output = make(fee);
        let min = builder.min_ada_required(&output.amount, output.data_hash.is_some());
        if output.amount.get_default() < BigInt::from(min) {
            return Ok(None);
        }
        Ok(Some((fee, output.amount)))
    }
}

fn add_mint(mint: &mut MintAssets, m: &MintRequest) {
    let assets = mint.entry(m.policy_id.clone()).or_default();
    let total = assets.remove(&m.asset_name).unwrap_or_default() + &m.amount;
    if total.sign() != Sign::NoSign {
        assets.insert(m.asset_name.clone(), total);
    }
    if assets.is_empty() {
        mint.remove(&m.policy_id);
    }
}

//! Operations exposed to the UI/API layer.
//!
//! Each operation turns a request into a `BuildPlan` (or a scan, or a
//! reconciliation) and maps every failure onto `ApiError`. Callers only ever
//! branch on `ApiError`; collaborator errors are folded into `BuildFailed`.

use crate::error::WalletError;
use crate::keystore::KeyStore;
use crate::oracle::{AccountStateOracle, AddressGenerator, AddressUsageOracle, ForeignUtxoFetcher};
use crate::pending::{self, PersistedSubmittedTransaction};
use crate::restore::{scan_account, RestoreLocks, ScanConfig};
use crate::signing::{sign_transaction, SignedTx, WitnessSigner};
use ada_tx::builder::{BuildKind, MintRequest};
use ada_tx::hw::ledger::{to_ledger_payload, LedgerSignRequest};
use ada_tx::hw::trezor::{to_trezor_payload, TrezorSignRequest};
use ada_tx::hw::FirmwareVersion;
use ada_tx::metadata::MintTag;
use ada_tx::voting::{registration_metadata, RegistrationSigner, VotingRegistration};
use ada_tx::{
    fee, Assembler, AuxiliaryData, BuildPlan, Certificate, ChangeReceiver, InputSource, LedgerLib, OutputTarget,
    SelectionStrategy, StakeCredential, TxError, UnsignedTx, Withdrawal,
};
use ada_types::address::reward_address_credential;
use ada_types::{AddressedUtxo, Addressing, MultiToken, NetworkConfig, UtxoId};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("no spendable reward balance")]
    NoSpendableRewardBalance,

    #[error("foreign inputs not found: {}", .0.join(", "))]
    ForeignInputMissing(Vec<String>),

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("scan incomplete: {0}")]
    ScanIncomplete(String),

    #[error("cancelled")]
    Cancelled,

    #[error("build failed: {0}")]
    BuildFailed(String),
}

impl From<TxError> for ApiError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::InvalidRequest(m) => ApiError::InvalidRequest(m),
            TxError::InsufficientFunds(m) => ApiError::InsufficientFunds(m),
            e @ (TxError::OutputBelowMinimum { .. } | TxError::UnsupportedByDevice { .. } | TxError::Types(_)) => {
                ApiError::InvalidRequest(e.to_string())
            }
            other => ApiError::BuildFailed(other.to_string()),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Tx(e) => e.into(),
            WalletError::DecryptionFailed => ApiError::IncorrectPassword,
            e @ WalletError::ScanIncomplete { .. } => ApiError::ScanIncomplete(e.to_string()),
            WalletError::Cancelled => ApiError::Cancelled,
            other => ApiError::BuildFailed(other.to_string()),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub address: String,
    /// Ignored when sending everything.
    #[serde(default)]
    pub amount: Option<MultiToken>,
    #[serde(default)]
    pub ensure_min_value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnsignedTxRequest {
    pub absolute_slot: u64,
    pub utxos: Vec<AddressedUtxo>,
    pub receivers: Vec<Receiver>,
    #[serde(default)]
    pub change: Vec<ChangeReceiver>,
    #[serde(default)]
    pub should_send_all: bool,
    #[serde(default)]
    pub metadata: Option<AuxiliaryData>,
    #[serde(default)]
    pub strategy: SelectionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorTxRequest {
    pub absolute_slot: u64,
    pub utxos: Vec<AddressedUtxo>,
    /// `txHash ++ index` ids the dApp insists on.
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<OutputTarget>,
    pub change: ChangeReceiver,
    #[serde(default)]
    pub mint: Vec<MintRequest>,
    #[serde(default)]
    pub mint_tags: Vec<MintTag>,
    #[serde(default)]
    pub metadata: Option<AuxiliaryData>,
    #[serde(default)]
    pub required_signers: Vec<String>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub validity_start: Option<u64>,
    #[serde(default)]
    pub only_inputs_intended: bool,
    #[serde(default)]
    pub strategy: SelectionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTxRequest {
    pub absolute_slot: u64,
    pub utxos: Vec<AddressedUtxo>,
    pub change: ChangeReceiver,
    pub reward_address: String,
    pub staking_addressing: Addressing,
    pub pool_key_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTxResponse {
    pub tx: UnsignedTx,
    /// Spendable UTXO lovelace plus the reward balance.
    pub total_amount_to_delegate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalTarget {
    pub reward_address: String,
    #[serde(default)]
    pub should_deregister: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalTxRequest {
    pub absolute_slot: u64,
    pub utxos: Vec<AddressedUtxo>,
    pub change: ChangeReceiver,
    pub withdrawals: Vec<WithdrawalTarget>,
    pub staking_addressing: Addressing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingRegTxRequest {
    pub absolute_slot: u64,
    pub utxos: Vec<AddressedUtxo>,
    pub change: ChangeReceiver,
    pub voting_key: String,
    pub staking_key: String,
    pub reward_address: String,
    pub staking_addressing: Addressing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    /// Account public key handed to the address generator.
    pub account_key: String,
    /// Path of the account, e.g. `m/1852'/1815'/0'`.
    pub account: Addressing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub addresses: Vec<(String, Addressing)>,
}

// =============================================================================
// API
// =============================================================================

/// Wallet operations for one network.
pub struct WalletApi<'a, L: LedgerLib> {
    ledger: &'a L,
    config: &'a NetworkConfig,
}

impl<'a, L: LedgerLib> WalletApi<'a, L> {
    pub fn new(ledger: &'a L, config: &'a NetworkConfig) -> Self {
        Self { ledger, config }
    }

    fn assemble(&self, plan: BuildPlan) -> Result<UnsignedTx, ApiError> {
        Ok(Assembler::new(self.ledger, &self.config.protocol).build(plan)?)
    }

    fn ttl(&self, absolute_slot: u64) -> u64 {
        absolute_slot + self.config.ttl_offset
    }

    /// Send-all or targeted send.
    pub fn create_unsigned_tx(&self, req: CreateUnsignedTxRequest) -> Result<UnsignedTx, ApiError> {
        let net = self.config.protocol.network_id;
        let kind = if req.should_send_all {
            BuildKind::SendAll
        } else {
            BuildKind::Targeted
        };

        let mut outputs = Vec::with_capacity(req.receivers.len());
        for r in req.receivers {
            let value = match (kind, r.amount) {
                (BuildKind::SendAll, _) => MultiToken::new(net),
                (_, Some(v)) => v,
                (_, None) => {
                    return Err(ApiError::InvalidRequest(format!("no amount for receiver {}", r.address)));
                }
            };
            let mut target = OutputTarget::new(r.address, value);
            if r.ensure_min_value {
                target = target.ensure_min_value();
            }
            outputs.push(target);
        }

        self.assemble(BuildPlan {
            kind,
            candidates: req.utxos,
            outputs,
            change: req.change,
            auxiliary_data: req.metadata,
            ttl: Some(self.ttl(req.absolute_slot)),
            strategy: req.strategy,
            ..Default::default()
        })
    }

    /// Connector build. Must-include ids not owned by the wallet are
    /// resolved through `fetcher`.
    pub async fn create_unsigned_tx_for_connector<F>(
        &self,
        req: ConnectorTxRequest,
        fetcher: &F,
    ) -> Result<UnsignedTx, ApiError>
    where
        F: ForeignUtxoFetcher + ?Sized,
    {
        let mut ids = Vec::with_capacity(req.must_include.len());
        for raw in &req.must_include {
            ids.push(UtxoId::parse(raw).map_err(|e| ApiError::InvalidRequest(e.to_string()))?);
        }

        let owned: HashMap<UtxoId, &AddressedUtxo> = req.utxos.iter().map(|u| (u.id(), u)).collect();
        let foreign_ids: Vec<UtxoId> = ids.iter().filter(|id| !owned.contains_key(*id)).cloned().collect();

        let mut foreign = HashMap::new();
        if !foreign_ids.is_empty() {
            let fetched = fetcher.fetch(&foreign_ids).await?;
            if fetched.len() != foreign_ids.len() {
                return Err(ApiError::BuildFailed(format!(
                    "fetcher returned {} results for {} ids",
                    fetched.len(),
                    foreign_ids.len()
                )));
            }
            let mut missing = Vec::new();
            for (id, found) in foreign_ids.iter().zip(fetched) {
                match found {
                    Some(u) => {
                        foreign.insert(id.clone(), u);
                    }
                    None => missing.push(id.to_string()),
                }
            }
            if !missing.is_empty() {
                return Err(ApiError::ForeignInputMissing(missing));
            }
        }

        let mut must_include = Vec::with_capacity(ids.len());
        for id in &ids {
            let source = match owned.get(id) {
                Some(u) => InputSource::Owned((*u).clone()),
                None => match foreign.get(id) {
                    Some(u) => InputSource::Foreign(u.clone()),
                    None => return Err(ApiError::ForeignInputMissing(vec![id.to_string()])),
                },
            };
            must_include.push(source);
        }

        let ttl = req.ttl.unwrap_or_else(|| self.ttl(req.absolute_slot));
        self.assemble(BuildPlan {
            kind: BuildKind::Connector,
            must_include,
            candidates: req.utxos,
            outputs: req.outputs,
            change: vec![req.change],
            auxiliary_data: req.metadata,
            mint_tags: req.mint_tags,
            mint: req.mint,
            required_signers: req.required_signers,
            ttl: Some(ttl),
            validity_start: req.validity_start,
            only_inputs_intended: req.only_inputs_intended,
            strategy: req.strategy,
            ..Default::default()
        })
    }

    /// Delegate the account's stake to a pool, registering the key first if
    /// the chain has never seen it.
    pub async fn create_delegation_tx<O>(
        &self,
        req: DelegationTxRequest,
        oracle: &O,
    ) -> Result<DelegationTxResponse, ApiError>
    where
        O: AccountStateOracle + ?Sized,
    {
        let states = oracle.account_state(std::slice::from_ref(&req.reward_address)).await?;
        // an absent entry means unknown state, not an unregistered key
        let state = match states.get(&req.reward_address) {
            Some(state) => *state,
            None => {
                return Err(ApiError::BuildFailed(format!(
                    "no account state for {}",
                    req.reward_address
                )));
            }
        };
        let credential = StakeCredential::KeyHash(reward_address_credential(&req.reward_address).map_err(TxError::from)?);

        let mut certificates = Vec::new();
        if state.is_none() {
            certificates.push(Certificate::StakeRegistration {
                credential: credential.clone(),
            });
        }
        certificates.push(Certificate::StakeDelegation {
            credential,
            pool_key_hash: req.pool_key_hash,
        });

        let utxo_sum: u64 = req.utxos.iter().map(|u| fee::lovelace(u.amount())).sum();
        let reward = state.map_or(0, |s| s.remaining_amount);

        let tx = self.assemble(BuildPlan {
            candidates: req.utxos,
            change: vec![req.change],
            certificates,
            ttl: Some(self.ttl(req.absolute_slot)),
            staking_addressing: Some(req.staking_addressing),
            ..Default::default()
        })?;
        Ok(DelegationTxResponse {
            tx,
            total_amount_to_delegate: utxo_sum + reward,
        })
    }

    /// Withdraw every non-empty reward account, deregistering those flagged.
    pub async fn create_withdrawal_tx<O>(&self, req: WithdrawalTxRequest, oracle: &O) -> Result<UnsignedTx, ApiError>
    where
        O: AccountStateOracle + ?Sized,
    {
        let addresses: Vec<String> = req.withdrawals.iter().map(|w| w.reward_address.clone()).collect();
        let states = oracle.account_state(&addresses).await?;

        let mut withdrawals = Vec::new();
        let mut certificates = Vec::new();
        for target in &req.withdrawals {
            let remaining = match states.get(&target.reward_address) {
                Some(Some(s)) => s.remaining_amount,
                Some(None) => 0,
                None => {
                    warn!("no account state for {}", target.reward_address);
                    0
                }
            };
            if remaining > 0 {
                withdrawals.push(Withdrawal {
                    reward_address: target.reward_address.clone(),
                    amount: remaining,
                });
            }
            if target.should_deregister {
                let hash = reward_address_credential(&target.reward_address).map_err(TxError::from)?;
                certificates.push(Certificate::StakeDeregistration {
                    credential: StakeCredential::KeyHash(hash),
                });
            }
        }
        if withdrawals.is_empty() && certificates.is_empty() {
            return Err(ApiError::NoSpendableRewardBalance);
        }

        self.assemble(BuildPlan {
            candidates: req.utxos,
            change: vec![req.change],
            certificates,
            withdrawals,
            ttl: Some(self.ttl(req.absolute_slot)),
            staking_addressing: Some(req.staking_addressing),
            ..Default::default()
        })
    }

    /// Catalyst vote registration; the nonce is the current absolute slot.
    pub fn create_voting_reg_tx<S>(&self, req: VotingRegTxRequest, signer: &S) -> Result<UnsignedTx, ApiError>
    where
        S: RegistrationSigner,
    {
        let registration = VotingRegistration {
            voting_key: req.voting_key,
            staking_key: req.staking_key,
            reward_address: req.reward_address,
            nonce: req.absolute_slot,
        };
        let aux = registration_metadata(self.ledger, signer, &registration)?;
        self.assemble(BuildPlan {
            candidates: req.utxos,
            change: vec![req.change],
            auxiliary_data: Some(aux),
            ttl: Some(self.ttl(req.absolute_slot)),
            staking_addressing: Some(req.staking_addressing),
            ..Default::default()
        })
    }

    /// Sign locally with the sealed root key.
    pub fn sign_tx<S>(&self, tx: &UnsignedTx, store: &KeyStore, password: &[u8], signer: &S) -> Result<SignedTx, ApiError>
    where
        S: WitnessSigner + ?Sized,
    {
        Ok(sign_transaction(tx, store, password, signer)?)
    }

    pub fn to_trezor_payload(&self, tx: &UnsignedTx, firmware: FirmwareVersion) -> Result<TrezorSignRequest, ApiError> {
        Ok(to_trezor_payload(tx, self.config.network.protocol_magic(), firmware)?)
    }

    pub fn to_ledger_payload(&self, tx: &UnsignedTx, firmware: FirmwareVersion) -> Result<LedgerSignRequest, ApiError> {
        Ok(to_ledger_payload(tx, self.config.network.protocol_magic(), firmware)?)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            gap_limit: self.config.gap_limit,
            batch_size: self.config.batch_size,
        }
    }
}

/// Discover every address of an account, serialized per account key.
pub async fn restore_wallet_for_transfer<G, O>(
    req: RestoreRequest,
    config: ScanConfig,
    generator: &G,
    oracle: &O,
    locks: &RestoreLocks,
    cancel: &AtomicBool,
) -> Result<RestoreResponse, ApiError>
where
    G: AddressGenerator + ?Sized,
    O: AddressUsageOracle + ?Sized,
{
    let _guard = locks.lock(&req.account_key).await;
    let plan = scan_account(req.account, &req.account_key, generator, oracle, config, cancel).await?;
    let addresses = plan.addresses();
    info!("restored {} addresses", addresses.len());
    Ok(RestoreResponse { addresses })
}

/// Effective spendable coins after applying pending transactions.
pub fn reconcile_utxos(
    confirmed: &[AddressedUtxo],
    pending: &[PersistedSubmittedTransaction],
    owned: &HashMap<String, Addressing>,
    public_deriver_id: u32,
) -> Vec<AddressedUtxo> {
    pending::reconcile(confirmed, pending, owned, public_deriver_id)
}

use ada_tx::builder::{Witness, MintRequest};
use ada_tx::hw::FirmwareVersion;
use ada_tx::voting::RegistrationSigner;
use ada_tx::{Certificate, ChangeReceiver, EstimatingLedger, OutputTarget, TxError};
use ada_types::constants::metadata_label::{VOTING_REGISTRATION, VOTING_SIGNATURE};
use ada_types::constants::{chain, purpose};
use ada_types::multi_token::make_identifier;
use ada_types::{AddressedUtxo, Addressing, MultiToken, Network, NetworkConfig, TokenEntry, Utxo, UtxoId};
use ada_wallet::api::{
    ApiError, ConnectorTxRequest, CreateUnsignedTxRequest, DelegationTxRequest, Receiver, VotingRegTxRequest,
    WithdrawalTarget, WithdrawalTxRequest,
};
use ada_wallet::{AccountState, AccountStateOracle, ForeignUtxoFetcher, KeyStore, WalletApi, WalletError, WitnessSigner};
use async_trait::async_trait;
use num_bigint::BigInt;
use std::collections::HashMap;

const ADA: u64 = 1_000_000;
const SLOT: u64 = 90_000_000;

fn config() -> NetworkConfig {
    NetworkConfig::preset(Network::Mainnet)
}

fn stake_hash() -> String {
    "44".repeat(28)
}

fn reward_address() -> String {
    format!("e1{}", stake_hash())
}

fn staking() -> Addressing {
    Addressing::address(purpose::CIP1852, 0, chain::STAKING, 0)
}

fn utxo(n: u8, value: MultiToken) -> AddressedUtxo {
    AddressedUtxo::new(
        Utxo {
            tx_hash: format!("{:02x}", n).repeat(32),
            output_index: 0,
            address: format!("01{}{}", "11".repeat(28), stake_hash()),
            amount: value,
        },
        Addressing::address(purpose::CIP1852, 0, chain::EXTERNAL, n as u32),
    )
}

fn ada(n: u64) -> MultiToken {
    MultiToken::from_default(1, n * ADA)
}

fn change() -> ChangeReceiver {
    ChangeReceiver {
        address: format!("01{}{}", "22".repeat(28), stake_hash()),
        addressing: Addressing::address(purpose::CIP1852, 0, chain::INTERNAL, 0),
    }
}

fn receiver() -> String {
    format!("61{}", "33".repeat(28))
}

struct FixedStates(HashMap<String, Option<AccountState>>);

impl FixedStates {
    fn one(state: Option<u64>) -> Self {
        let mut m = HashMap::new();
        m.insert(reward_address(), state.map(|remaining_amount| AccountState { remaining_amount }));
        Self(m)
    }
}

#[async_trait]
impl AccountStateOracle for FixedStates {
    async fn account_state(&self, addrs: &[String]) -> Result<HashMap<String, Option<AccountState>>, WalletError> {
        Ok(addrs
            .iter()
            .filter_map(|a| self.0.get(a).map(|state| (a.clone(), *state)))
            .collect())
    }
}

struct MapFetcher(HashMap<UtxoId, Utxo>);

#[async_trait]
impl ForeignUtxoFetcher for MapFetcher {
    async fn fetch(&self, ids: &[UtxoId]) -> Result<Vec<Option<Utxo>>, WalletError> {
        Ok(ids.iter().map(|id| self.0.get(id).cloned()).collect())
    }
}

struct StaticSigner;

impl RegistrationSigner for StaticSigner {
    fn sign_registration(&self, _hash_hex: &str) -> Result<String, TxError> {
        Ok("cd".repeat(64))
    }
}

impl WitnessSigner for StaticSigner {
    fn sign(&self, _root: &[u8], addressing: &Addressing, _tx_hash: &str) -> Result<Witness, WalletError> {
        Ok(Witness {
            vkey: format!("{:064x}", addressing.path.last().copied().unwrap_or(0)),
            signature: "00".repeat(64),
        })
    }
}

fn send_request(amount: MultiToken) -> CreateUnsignedTxRequest {
    CreateUnsignedTxRequest {
        absolute_slot: SLOT,
        utxos: vec![utxo(1, ada(10))],
        receivers: vec![Receiver {
            address: receiver(),
            amount: Some(amount),
            ensure_min_value: false,
        }],
        change: vec![change()],
        should_send_all: false,
        metadata: None,
        strategy: Default::default(),
    }
}

// ─── CreateUnsignedTx ────────────────────────────────────────────────────────

#[test]
fn test_targeted_send_sets_ttl() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api.create_unsigned_tx(send_request(ada(3))).unwrap();
    assert_eq!(tx.built.body.ttl, Some(SLOT + cfg.ttl_offset));
    assert_eq!(tx.built.body.outputs.len(), 2);
    assert_eq!(tx.change.len(), 1);
}

#[test]
fn test_send_all_single_output() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let mut req = send_request(ada(1));
    req.utxos.push(utxo(2, ada(4)));
    req.should_send_all = true;
    req.change.clear();
    let tx = api.create_unsigned_tx(req).unwrap();
    assert_eq!(tx.built.body.outputs.len(), 1);
    assert!(tx.change.is_empty());
    assert!(tx.change_address().is_none());
    assert_eq!(tx.built.body.outputs[0].amount.default_u64().unwrap(), 14 * ADA - tx.fee());
}

#[test]
fn test_send_all_rejects_two_receivers() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let mut req = send_request(ada(1));
    req.should_send_all = true;
    req.change.clear();
    req.receivers.push(req.receivers[0].clone());
    assert!(matches!(api.create_unsigned_tx(req), Err(ApiError::InvalidRequest(_))));
}

#[test]
fn test_two_change_receivers_invalid() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let mut req = send_request(ada(1));
    req.change.push(change());
    assert!(matches!(api.create_unsigned_tx(req), Err(ApiError::InvalidRequest(_))));
}

#[test]
fn test_insufficient_funds_surfaces() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let err = api.create_unsigned_tx(send_request(ada(100))).unwrap_err();
    assert!(matches!(err, ApiError::InsufficientFunds(_)));
}

#[test]
fn test_output_below_minimum_is_invalid_request() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let err = api
        .create_unsigned_tx(send_request(MultiToken::from_default(1, 100_000u64)))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

// ─── Connector ───────────────────────────────────────────────────────────────

fn connector_request(must_include: Vec<String>) -> ConnectorTxRequest {
    ConnectorTxRequest {
        absolute_slot: SLOT,
        utxos: vec![utxo(1, ada(10))],
        must_include,
        outputs: vec![OutputTarget::new(receiver(), ada(2))],
        change: change(),
        mint: Vec::new(),
        mint_tags: Vec::new(),
        metadata: None,
        required_signers: Vec::new(),
        ttl: None,
        validity_start: None,
        only_inputs_intended: false,
        strategy: Default::default(),
    }
}

#[tokio::test]
async fn test_foreign_input_missing() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let unknown = UtxoId::new("ee".repeat(32), 3).to_string();
    let err = api
        .create_unsigned_tx_for_connector(connector_request(vec![unknown.clone()]), &MapFetcher(HashMap::new()))
        .await
        .unwrap_err();
    match err {
        ApiError::ForeignInputMissing(ids) => assert_eq!(ids, vec![unknown]),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_foreign_input_resolved() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let id = UtxoId::new("ee".repeat(32), 3);
    let mut known = HashMap::new();
    known.insert(
        id.clone(),
        Utxo {
            tx_hash: id.tx_hash.clone(),
            output_index: 3,
            address: format!("61{}", "55".repeat(28)),
            amount: ada(5),
        },
    );
    let tx = api
        .create_unsigned_tx_for_connector(connector_request(vec![id.to_string()]), &MapFetcher(known))
        .await
        .unwrap();
    assert_eq!(tx.foreign_inputs.len(), 1);
    assert!(tx.built.body.inputs.iter().any(|i| i.tx_hash == id.tx_hash && i.index == 3));
}

#[tokio::test]
async fn test_owned_must_include_needs_no_fetch() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let owned_id = utxo(1, ada(10)).id().to_string();
    let tx = api
        .create_unsigned_tx_for_connector(connector_request(vec![owned_id]), &MapFetcher(HashMap::new()))
        .await
        .unwrap();
    assert!(tx.foreign_inputs.is_empty());
    assert_eq!(tx.sender_utxos.len(), 1);
}

#[tokio::test]
async fn test_malformed_must_include_id() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let err = api
        .create_unsigned_tx_for_connector(connector_request(vec!["nothex".into()]), &MapFetcher(HashMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_connector_mint_into_output() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let policy = "7a".repeat(28);
    let mut req = connector_request(Vec::new());
    req.outputs = vec![OutputTarget::new(receiver(), ada(2))
        .with_mint(MintRequest {
            policy_id: policy.clone(),
            asset_name: "6e6674".into(),
            amount: BigInt::from(1),
        })
        .ensure_min_value()];
    let tx = api
        .create_unsigned_tx_for_connector(req, &MapFetcher(HashMap::new()))
        .await
        .unwrap();
    let minted = make_identifier(&policy, "6e6674");
    assert_eq!(tx.built.body.outputs[0].amount.get(&minted), BigInt::from(1));
    assert_eq!(tx.built.body.mint[&policy]["6e6674"], BigInt::from(1));
}

// ─── Delegation / withdrawal / voting ────────────────────────────────────────

fn delegation_request() -> DelegationTxRequest {
    DelegationTxRequest {
        absolute_slot: SLOT,
        utxos: vec![utxo(1, ada(10))],
        change: change(),
        reward_address: reward_address(),
        staking_addressing: staking(),
        pool_key_hash: "99".repeat(28),
    }
}

#[tokio::test]
async fn test_delegation_registers_new_key() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let resp = api
        .create_delegation_tx(delegation_request(), &FixedStates::one(None))
        .await
        .unwrap();
    let certs = resp.tx.certificates();
    assert_eq!(certs.len(), 2);
    assert!(matches!(certs[0], Certificate::StakeRegistration { .. }));
    assert!(matches!(certs[1], Certificate::StakeDelegation { .. }));
    assert_eq!(resp.total_amount_to_delegate, 10 * ADA);
    assert!(resp.tx.needed_staking_key_hashes.required.contains(&stake_hash()));
}

#[tokio::test]
async fn test_delegation_of_registered_key_counts_rewards() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let resp = api
        .create_delegation_tx(delegation_request(), &FixedStates::one(Some(3 * ADA)))
        .await
        .unwrap();
    assert_eq!(resp.tx.certificates().len(), 1);
    assert_eq!(resp.total_amount_to_delegate, 13 * ADA);
}

#[tokio::test]
async fn test_delegation_without_account_state_fails() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let err = api
        .create_delegation_tx(delegation_request(), &FixedStates(HashMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BuildFailed(_)));
}

fn withdrawal_request(should_deregister: bool) -> WithdrawalTxRequest {
    WithdrawalTxRequest {
        absolute_slot: SLOT,
        utxos: vec![utxo(1, ada(10))],
        change: change(),
        withdrawals: vec![WithdrawalTarget {
            reward_address: reward_address(),
            should_deregister,
        }],
        staking_addressing: staking(),
    }
}

#[tokio::test]
async fn test_empty_rewards_no_spendable_balance() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let err = api
        .create_withdrawal_tx(withdrawal_request(false), &FixedStates::one(Some(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NoSpendableRewardBalance));
}

#[tokio::test]
async fn test_withdrawal_of_rewards() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api
        .create_withdrawal_tx(withdrawal_request(false), &FixedStates::one(Some(1_500_000)))
        .await
        .unwrap();
    assert_eq!(tx.withdrawals().len(), 1);
    assert_eq!(tx.withdrawals()[0].amount, 1_500_000);
    assert!(tx.certificates().is_empty());
    assert_eq!(tx.staking_addressing, Some(staking()));
}

#[tokio::test]
async fn test_deregistration_without_rewards_allowed() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api
        .create_withdrawal_tx(withdrawal_request(true), &FixedStates::one(Some(0)))
        .await
        .unwrap();
    assert!(tx.withdrawals().is_empty());
    assert!(matches!(tx.certificates()[0], Certificate::StakeDeregistration { .. }));
    // deposit refund lands in change
    assert!(tx.change[0].value.default_u64().unwrap() > 10 * ADA);
}

#[test]
fn test_voting_registration_metadata() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api
        .create_voting_reg_tx(
            VotingRegTxRequest {
                absolute_slot: SLOT,
                utxos: vec![utxo(1, ada(10))],
                change: change(),
                voting_key: "11".repeat(32),
                staking_key: "22".repeat(32),
                reward_address: reward_address(),
                staking_addressing: staking(),
            },
            &StaticSigner,
        )
        .unwrap();
    let aux = tx.metadata.as_ref().unwrap();
    assert!(aux.contains(VOTING_REGISTRATION));
    assert!(aux.contains(VOTING_SIGNATURE));
    assert_eq!(aux.get(VOTING_REGISTRATION).unwrap()["4"], SLOT);
    assert!(tx.built.body.auxiliary_data_hash.is_some());
}

// ─── Signing ─────────────────────────────────────────────────────────────────

#[test]
fn test_incorrect_password() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api.create_unsigned_tx(send_request(ada(3))).unwrap();
    let store = KeyStore::create(&[9u8; 96], b"correct horse").unwrap();
    let err = api.sign_tx(&tx, &store, b"battery staple", &StaticSigner).unwrap_err();
    assert!(matches!(err, ApiError::IncorrectPassword));
    let signed = api.sign_tx(&tx, &store, b"correct horse", &StaticSigner).unwrap();
    assert_eq!(signed.witnesses.len(), 1);
}

// ─── Hardware payloads ───────────────────────────────────────────────────────

#[test]
fn test_hw_payloads_from_api() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let tx = api.create_unsigned_tx(send_request(ada(3))).unwrap();
    let trezor = api.to_trezor_payload(&tx, FirmwareVersion::new(2, 4, 3)).unwrap();
    assert_eq!(trezor.inputs.len(), 1);
    let ledger = api.to_ledger_payload(&tx, FirmwareVersion::new(3, 0, 0)).unwrap();
    assert_eq!(ledger.tx.inputs.len(), 1);
}

#[test]
fn test_old_firmware_rejects_tokens() {
    let cfg = config();
    let api = WalletApi::new(&EstimatingLedger, &cfg);
    let mut held = ada(10);
    held.add(TokenEntry::new(make_identifier(&"7a".repeat(28), "78"), 1, 5));
    let mut req = send_request({
        let mut v = ada(2);
        v.add(TokenEntry::new(make_identifier(&"7a".repeat(28), "78"), 1, 5));
        v
    });
    req.utxos = vec![utxo(1, held)];
    let tx = api.create_unsigned_tx(req).unwrap();
    let err = api.to_trezor_payload(&tx, FirmwareVersion::new(2, 3, 0)).unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

//! Hardware-wallet signing payloads.
//!
//! Pure translation from an `UnsignedTx` into the request shapes the Trezor
//! and Ledger bridges accept. Anything the target firmware cannot represent
//! is a translation error, never a silent omission.

pub mod ledger;
pub mod trezor;

use crate::builder::UnsignedTx;
use crate::certificate::StakeCredential;
use crate::fee::blake2b_hex;
use crate::ledger::TxOutput;
use crate::voting::VotingRegistration;
use crate::TxError;
use ada_types::address::{parse_header, reward_address_credential, AddressKind};
use ada_types::constants::metadata_label::VOTING_REGISTRATION;
use ada_types::constants::KEY_HASH_SIZE;
use ada_types::{Addressing, MultiToken, UtxoId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Trezor,
    Ledger,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Trezor => write!(f, "trezor"),
            DeviceKind::Ledger => write!(f, "ledger"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trezor" => Ok(DeviceKind::Trezor),
            "ledger" => Ok(DeviceKind::Ledger),
            other => Err(TxError::InvalidRequest(format!("unknown device: {}", other))),
        }
    }
}

/// Firmware (Trezor) or app (Ledger) version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FirmwareVersion {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TxError::InvalidRequest(format!("bad firmware version: {}", s));
        let parts: Vec<u32> = s
            .trim_start_matches('v')
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| bad()))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            _ => Err(bad()),
        }
    }
}

/// Transaction features gated by firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    MultiAsset,
    ValidityIntervalStart,
    Mint,
    VoteRegistration,
    RequiredSigners,
    ScriptCredentials,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Feature::MultiAsset => "multi-asset outputs",
            Feature::ValidityIntervalStart => "validity interval start",
            Feature::Mint => "minting",
            Feature::VoteRegistration => "vote registration",
            Feature::RequiredSigners => "required signers",
            Feature::ScriptCredentials => "script stake credentials",
        };
        f.write_str(s)
    }
}

/// Oldest version of `device` that supports `feature`.
pub fn minimum_version(device: DeviceKind, feature: Feature) -> FirmwareVersion {
    match (device, feature) {
        (DeviceKind::Trezor, Feature::MultiAsset) => FirmwareVersion::new(2, 3, 2),
        (DeviceKind::Trezor, Feature::VoteRegistration) => FirmwareVersion::new(2, 3, 5),
        (DeviceKind::Trezor, Feature::ValidityIntervalStart) => FirmwareVersion::new(2, 4, 2),
        (DeviceKind::Trezor, Feature::Mint) => FirmwareVersion::new(2, 4, 3),
        (DeviceKind::Trezor, Feature::RequiredSigners) => FirmwareVersion::new(2, 4, 3),
        (DeviceKind::Trezor, Feature::ScriptCredentials) => FirmwareVersion::new(2, 4, 3),
        (DeviceKind::Ledger, Feature::MultiAsset) => FirmwareVersion::new(2, 2, 0),
        (DeviceKind::Ledger, Feature::ValidityIntervalStart) => FirmwareVersion::new(2, 3, 2),
        (DeviceKind::Ledger, Feature::VoteRegistration) => FirmwareVersion::new(2, 3, 2),
        (DeviceKind::Ledger, Feature::Mint) => FirmwareVersion::new(3, 0, 0),
        (DeviceKind::Ledger, Feature::RequiredSigners) => FirmwareVersion::new(3, 0, 0),
        (DeviceKind::Ledger, Feature::ScriptCredentials) => FirmwareVersion::new(3, 0, 0),
    }
}

pub fn require(device: DeviceKind, version: FirmwareVersion, feature: Feature) -> Result<(), TxError> {
    if version >= minimum_version(device, feature) {
        Ok(())
    } else {
        Err(TxError::UnsupportedByDevice {
            device: device.to_string(),
            version: version.to_string(),
            feature: feature.to_string(),
        })
    }
}

/// Check every gated feature `tx` uses.
pub fn check_features(tx: &UnsignedTx, device: DeviceKind, version: FirmwareVersion) -> Result<(), TxError> {
    let body = &tx.built.body;
    if body.outputs.iter().any(|o| o.amount.has_non_default()) {
        require(device, version, Feature::MultiAsset)?;
    }
    if body.validity_start.is_some() {
        require(device, version, Feature::ValidityIntervalStart)?;
    }
    if !body.mint.is_empty() {
        require(device, version, Feature::Mint)?;
    }
    if !body.required_signers.is_empty() {
        require(device, version, Feature::RequiredSigners)?;
    }
    if vote_registration(tx).is_some() {
        require(device, version, Feature::VoteRegistration)?;
    }
    let script_certificate = body
        .certificates
        .iter()
        .any(|c| matches!(c.credential(), StakeCredential::ScriptHash(_)));
    let mut script_withdrawal = false;
    for w in &body.withdrawals {
        script_withdrawal |= parse_header(&w.reward_address)?.stake_is_script();
    }
    if script_certificate || script_withdrawal {
        require(device, version, Feature::ScriptCredentials)?;
    }
    Ok(())
}

// ─── Shared translation helpers ──────────────────────────────────────────────

/// How the device should treat one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Destination {
    /// The device re-derives and shows the address itself.
    DeviceOwned {
        kind: AddressKind,
        path: Vec<u32>,
        staking_path: Option<Vec<u32>>,
    },
    ThirdParty { address: String },
}

pub(crate) fn destination(tx: &UnsignedTx, output: &TxOutput) -> Result<Destination, TxError> {
    let Some(addressing) = tx.change_addressing(&output.address) else {
        return Ok(Destination::ThirdParty {
            address: output.address.clone(),
        });
    };
    let kind = parse_header(&output.address)?.kind;
    let staking_path = match kind {
        AddressKind::Base => Some(
            addressing
                .staking_key()
                .ok_or_else(|| TxError::Signing("change address has no staking path".into()))?
                .path,
        ),
        _ => None,
    };
    Ok(Destination::DeviceOwned {
        kind,
        path: addressing.path.clone(),
        staking_path,
    })
}

/// Signing path of a body input, `None` for foreign inputs.
pub(crate) fn input_path(tx: &UnsignedTx, id: &UtxoId) -> Option<Vec<u32>> {
    tx.sender_utxos
        .iter()
        .find(|u| &u.id() == id)
        .map(|u| u.addressing.path.clone())
}

pub(crate) fn staking_path(tx: &UnsignedTx, what: &str) -> Result<Vec<u32>, TxError> {
    tx.staking_addressing
        .as_ref()
        .map(|a: &Addressing| a.path.clone())
        .ok_or_else(|| TxError::Signing(format!("{} needs the staking key path", what)))
}

/// Group non-native tokens by policy.
pub(crate) fn token_groups(value: &MultiToken) -> BTreeMap<String, Vec<(String, String)>> {
    let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for t in value.non_default_entries() {
        if let Some((policy, name)) = t.policy_and_name() {
            groups
                .entry(policy.to_string())
                .or_default()
                .push((name.to_string(), t.amount.to_string()));
        }
    }
    groups
}

pub(crate) fn vote_registration(tx: &UnsignedTx) -> Option<VotingRegistration> {
    tx.metadata
        .as_ref()
        .and_then(|aux| aux.get(VOTING_REGISTRATION))
        .and_then(VotingRegistration::from_payload)
}

/// Vote registration the device can rebuild from the staking path alone.
///
/// Devices derive the reward address from the staking key, so the
/// registered reward address must be that key's own key-hash reward address.
pub(crate) fn device_vote_registration(tx: &UnsignedTx) -> Result<Option<VotingRegistration>, TxError> {
    let Some(reg) = vote_registration(tx) else {
        return Ok(None);
    };
    let staking_key = hex::decode(&reg.staking_key)
        .map_err(|e| TxError::InvalidRequest(format!("bad vote registration staking key: {}", e)))?;
    let own = blake2b_hex(&staking_key, KEY_HASH_SIZE);
    let header = parse_header(&reg.reward_address)?;
    if header.kind != AddressKind::Reward
        || header.stake_is_script()
        || reward_address_credential(&reg.reward_address)? != own
    {
        return Err(TxError::InvalidRequest(format!(
            "vote registration reward address {} is not the staking key's reward address",
            reg.reward_address
        )));
    }
    Ok(Some(reg))
}

pub(crate) fn lovelace_string(value: &MultiToken) -> String {
    value.get_default().to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::builder::{Assembler, BuildPlan, ChangeReceiver, OutputTarget, UnsignedTx};
    use crate::certificate::{Certificate, StakeCredential};
    use crate::fee::{blake2b_hex, EstimatingLedger};
    use crate::metadata::AuxiliaryData;
    use ada_types::constants::metadata_label::VOTING_REGISTRATION;
    use ada_types::constants::{chain, purpose};
    use serde_json::json;
    use ada_types::{AddressedUtxo, Addressing, MultiToken, Network, ProtocolParameters, TokenEntry, Utxo};

    pub const CHANGE: &str = "015bad085057ac10ecc7060f7ac41edd6f63068d8963ef7d86ca58669e5ecf2d283418a60be5a848a2380eb721000da1e0bbf39733134beca4";
    pub const RECEIVER: &str = "61fc3ffc8d5ef1d5b1dbd30e8b887cd0f8ab8f3165944c7a9e6c2b8a6b";

    pub fn build(tokens: bool, delegate: bool) -> UnsignedTx {
        let p = ProtocolParameters::for_network(Network::Mainnet);
        let mut value = MultiToken::from_default(1, 2_000_000u64);
        let mut held = MultiToken::from_default(1, 10_000_000u64);
        if tokens {
            let id = format!("{}.{}", "aa".repeat(28), "746f6b656e58");
            value.add(TokenEntry::new(id.clone(), 1, 5));
            held.add(TokenEntry::new(id, 1, 5));
        }
        let coin = AddressedUtxo::new(
            Utxo {
                tx_hash: "0f".repeat(32),
                output_index: 1,
                address: CHANGE.into(),
                amount: held,
            },
            Addressing::address(purpose::CIP1852, 0, chain::EXTERNAL, 0),
        );
        let account_staking = Addressing::address(purpose::CIP1852, 0, chain::STAKING, 0);
        let certificates = if delegate {
            vec![Certificate::StakeDelegation {
                credential: StakeCredential::KeyHash("5e".repeat(28)),
                pool_key_hash: "df".repeat(28),
            }]
        } else {
            Vec::new()
        };
        let plan = BuildPlan {
            candidates: vec![coin],
            outputs: vec![OutputTarget::new(RECEIVER, value)],
            change: vec![ChangeReceiver {
                address: CHANGE.into(),
                addressing: Addressing::address(purpose::CIP1852, 0, chain::INTERNAL, 0),
            }],
            certificates,
            ttl: Some(5_000),
            staking_addressing: if delegate { Some(account_staking) } else { None },
            ..Default::default()
        };
        Assembler::new(&EstimatingLedger, &p).build(plan).unwrap()
    }

    /// Delegation to `credential` in place of the fixture's key-hash one.
    pub fn with_certificate_credential(credential: StakeCredential) -> UnsignedTx {
        let mut tx = build(false, true);
        tx.built.body.certificates = vec![Certificate::StakeDelegation {
            credential,
            pool_key_hash: "df".repeat(28),
        }];
        tx
    }

    /// Attach a vote registration for stake key `22..22` rewarding `reward_address`.
    pub fn with_vote_registration(reward_address: &str) -> UnsignedTx {
        let mut tx = build(false, true);
        let mut aux = AuxiliaryData::new();
        aux.insert(
            VOTING_REGISTRATION,
            json!({
                "1": format!("0x{}", "11".repeat(32)),
                "2": format!("0x{}", STAKE_KEY),
                "3": format!("0x{}", reward_address),
                "4": 42,
            }),
        )
        .unwrap();
        tx.metadata = Some(aux);
        tx
    }

    pub const STAKE_KEY: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    /// Key-hash reward address of `STAKE_KEY` on mainnet.
    pub fn own_reward_address() -> String {
        format!("e1{}", blake2b_hex(&hex::decode(STAKE_KEY).unwrap(), 28))
    }
}

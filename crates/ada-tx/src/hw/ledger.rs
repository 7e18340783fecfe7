//! Ledger Cardano app `signTransaction` request.

use super::{
    check_features, destination, device_vote_registration, input_path, lovelace_string, staking_path, token_groups,
    Destination, DeviceKind, FirmwareVersion,
};
use crate::builder::UnsignedTx;
use crate::certificate::{Certificate, StakeCredential};
use crate::TxError;
use ada_types::address::{parse_header, reward_address_credential, AddressKind};
use ada_types::{MultiToken, UtxoId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningMode {
    OrdinaryTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerNetwork {
    pub network_id: u8,
    pub protocol_magic: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInput {
    pub tx_hash_hex: String,
    pub output_index: u32,
    pub path: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingParams {
    pub spending_path: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking_path: Option<Vec<u32>>,
}

/// Address parameters for a device-owned output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOwnedAddress {
    BasePaymentKeyStakeKey(SpendingParams),
    EnterpriseKey(SpendingParams),
    Byron(SpendingParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyParams {
    pub address_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputDestination {
    DeviceOwned(DeviceOwnedAddress),
    ThirdParty(ThirdPartyParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerToken {
    pub asset_name_hex: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAssetGroup {
    pub policy_id_hex: String,
    pub tokens: Vec<LedgerToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOutput {
    pub destination: OutputDestination,
    pub amount: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub token_bundle: Vec<LedgerAssetGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum_hash_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerCredential {
    KeyPath {
        #[serde(rename = "keyPath")]
        key_path: Vec<u32>,
    },
    ScriptHash {
        #[serde(rename = "scriptHashHex")]
        script_hash_hex: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeParams {
    pub stake_credential: LedgerCredential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationParams {
    pub stake_credential: LedgerCredential,
    pub pool_key_hash_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerCertificate {
    StakeRegistration(StakeParams),
    StakeDeregistration(StakeParams),
    StakeDelegation(DelegationParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerWithdrawal {
    pub stake_credential: LedgerCredential,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitraryHashParams {
    pub hash_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRegistrationParams {
    pub vote_public_key_hex: String,
    pub staking_path: Vec<u32>,
    pub reward_address_path: Vec<u32>,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerAuxiliaryData {
    ArbitraryHash(ArbitraryHashParams),
    CatalystRegistration(VoteRegistrationParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerRequiredSigner {
    Hash {
        #[serde(rename = "hashHex")]
        hash_hex: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTx {
    pub network: LedgerNetwork,
    pub inputs: Vec<LedgerInput>,
    pub outputs: Vec<LedgerOutput>,
    pub fee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub certificates: Vec<LedgerCertificate>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub withdrawals: Vec<LedgerWithdrawal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary_data: Option<LedgerAuxiliaryData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_interval_start: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mint: Vec<LedgerAssetGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required_signers: Vec<LedgerRequiredSigner>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSignRequest {
    pub signing_mode: SigningMode,
    pub tx: LedgerTx,
    pub additional_witness_paths: Vec<Vec<u32>>,
}

fn token_bundle(value: &MultiToken) -> Vec<LedgerAssetGroup> {
    token_groups(value)
        .into_iter()
        .map(|(policy_id_hex, tokens)| LedgerAssetGroup {
            policy_id_hex,
            tokens: tokens
                .into_iter()
                .map(|(asset_name_hex, amount)| LedgerToken { asset_name_hex, amount })
                .collect(),
        })
        .collect()
}

fn credential(tx: &UnsignedTx, credential: &StakeCredential) -> Result<LedgerCredential, TxError> {
    match credential {
        StakeCredential::KeyHash(_) => Ok(LedgerCredential::KeyPath {
            key_path: staking_path(tx, "certificate")?,
        }),
        StakeCredential::ScriptHash(h) => Ok(LedgerCredential::ScriptHash {
            script_hash_hex: h.clone(),
        }),
    }
}

fn device_owned(kind: AddressKind, params: SpendingParams) -> Result<DeviceOwnedAddress, TxError> {
    match kind {
        AddressKind::Base => Ok(DeviceOwnedAddress::BasePaymentKeyStakeKey(params)),
        AddressKind::Enterprise => Ok(DeviceOwnedAddress::EnterpriseKey(params)),
        AddressKind::Byron => Ok(DeviceOwnedAddress::Byron(params)),
        other => Err(TxError::Signing(format!("{:?} change address not supported by ledger", other))),
    }
}

/// Translate `tx` for a Ledger app running `version`.
pub fn to_ledger_payload(
    tx: &UnsignedTx,
    protocol_magic: u32,
    version: FirmwareVersion,
) -> Result<LedgerSignRequest, TxError> {
    check_features(tx, DeviceKind::Ledger, version)?;
    let body = &tx.built.body;

    let inputs = body
        .inputs
        .iter()
        .map(|i| LedgerInput {
            tx_hash_hex: i.tx_hash.clone(),
            output_index: i.index,
            path: input_path(tx, &UtxoId::new(i.tx_hash.clone(), i.index)),
        })
        .collect();

    let mut outputs = Vec::with_capacity(body.outputs.len());
    for o in &body.outputs {
        let destination = match destination(tx, o)? {
            Destination::DeviceOwned { kind, path, staking_path } => OutputDestination::DeviceOwned(device_owned(
                kind,
                SpendingParams {
                    spending_path: path,
                    staking_path,
                },
            )?),
            Destination::ThirdParty { address } => OutputDestination::ThirdParty(ThirdPartyParams { address_hex: address }),
        };
        outputs.push(LedgerOutput {
            destination,
            amount: lovelace_string(&o.amount),
            token_bundle: token_bundle(&o.amount),
            datum_hash_hex: o.data_hash.clone(),
        });
    }

    let mut certificates = Vec::with_capacity(body.certificates.len());
    for cert in &body.certificates {
        let stake_credential = credential(tx, cert.credential())?;
        certificates.push(match cert {
            Certificate::StakeRegistration { .. } => LedgerCertificate::StakeRegistration(StakeParams { stake_credential }),
            Certificate::StakeDeregistration { .. } => {
                LedgerCertificate::StakeDeregistration(StakeParams { stake_credential })
            }
            Certificate::StakeDelegation { pool_key_hash, .. } => LedgerCertificate::StakeDelegation(DelegationParams {
                stake_credential,
                pool_key_hash_hex: pool_key_hash.clone(),
            }),
        });
    }

    let mut withdrawals = Vec::with_capacity(body.withdrawals.len());
    for w in &body.withdrawals {
        let stake_credential = if parse_header(&w.reward_address)?.stake_is_script() {
            LedgerCredential::ScriptHash {
                script_hash_hex: reward_address_credential(&w.reward_address)?,
            }
        } else {
            LedgerCredential::KeyPath {
                key_path: staking_path(tx, "withdrawal")?,
            }
        };
        withdrawals.push(LedgerWithdrawal {
            stake_credential,
            amount: w.amount.to_string(),
        });
    }

    let auxiliary_data = match (device_vote_registration(tx)?, &body.auxiliary_data_hash) {
        (Some(reg), _) => {
            let path = staking_path(tx, "vote registration")?;
            Some(LedgerAuxiliaryData::CatalystRegistration(VoteRegistrationParams {
                vote_public_key_hex: reg.voting_key,
                staking_path: path.clone(),
                reward_address_path: path,
                nonce: reg.nonce.to_string(),
            }))
        }
        (None, Some(hash)) => Some(LedgerAuxiliaryData::ArbitraryHash(ArbitraryHashParams { hash_hex: hash.clone() })),
        (None, None) => None,
    };

    let mint = body
        .mint
        .iter()
        .map(|(policy, assets)| LedgerAssetGroup {
            policy_id_hex: policy.clone(),
            tokens: assets
                .iter()
                .map(|(name, qty)| LedgerToken {
                    asset_name_hex: name.clone(),
                    amount: qty.to_string(),
                })
                .collect(),
        })
        .collect();

    // Stake key must sign when certificates or withdrawals reference it.
    let mut additional_witness_paths = Vec::new();
    if !tx.needed_staking_key_hashes.required.is_empty() {
        if let Some(a) = &tx.staking_addressing {
            additional_witness_paths.push(a.path.clone());
        }
    }

    Ok(LedgerSignRequest {
        signing_mode: SigningMode::OrdinaryTransaction,
        tx: LedgerTx {
            network: LedgerNetwork {
                network_id: body.network_id,
                protocol_magic,
            },
            inputs,
            outputs,
            fee: body.fee.to_string(),
            ttl: body.ttl.map(|t| t.to_string()),
            certificates,
            withdrawals,
            auxiliary_data,
            validity_interval_start: body.validity_start.map(|t| t.to_string()),
            mint,
            required_signers: body
                .required_signers
                .iter()
                .map(|h| LedgerRequiredSigner::Hash { hash_hex: h.clone() })
                .collect(),
        },
        additional_witness_paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fixtures;

    #[test]
    fn test_destination_shapes() {
        let tx = fixtures::build(true, false);
        let req = to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(2, 3, 2)).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["signingMode"], "ORDINARY_TRANSACTION");
        let outs = &json["tx"]["outputs"];
        assert_eq!(outs[0]["destination"]["type"], "THIRD_PARTY");
        assert_eq!(outs[0]["destination"]["params"]["addressHex"], fixtures::RECEIVER);
        assert_eq!(outs[1]["destination"]["type"], "DEVICE_OWNED");
        assert_eq!(outs[1]["destination"]["params"]["type"], "BASE_PAYMENT_KEY_STAKE_KEY");
        assert_eq!(outs[0]["tokenBundle"][0]["tokens"][0]["amount"], "5");
    }

    #[test]
    fn test_delegation_adds_stake_witness_path() {
        let tx = fixtures::build(false, true);
        let req = to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(3, 0, 0)).unwrap();
        assert_eq!(req.additional_witness_paths.len(), 1);
        let json = serde_json::to_value(&req.tx.certificates[0]).unwrap();
        assert_eq!(json["type"], "STAKE_DELEGATION");
        assert_eq!(json["params"]["stakeCredential"]["type"], "KEY_PATH");
    }

    #[test]
    fn test_validity_start_needs_newer_app() {
        let mut tx = fixtures::build(false, false);
        tx.built.body.validity_start = Some(10);
        assert!(to_ledger_payload(&tx, 1, FirmwareVersion::new(2, 3, 1)).is_err());
        assert!(to_ledger_payload(&tx, 1, FirmwareVersion::new(2, 3, 2)).is_ok());
    }

    #[test]
    fn test_script_certificate_needs_multisig_app() {
        let tx = fixtures::with_certificate_credential(StakeCredential::ScriptHash("f6".repeat(28)));
        let err = to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(2, 2, 0)).unwrap_err();
        assert!(matches!(err, TxError::UnsupportedByDevice { .. }));
        let req = to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(3, 0, 0)).unwrap();
        let json = serde_json::to_value(&req.tx.certificates[0]).unwrap();
        assert_eq!(json["params"]["stakeCredential"]["type"], "SCRIPT_HASH");
    }

    #[test]
    fn test_vote_registration_with_foreign_reward_address_fails() {
        let tx = fixtures::with_vote_registration(&format!("e1{}", "33".repeat(28)));
        let err = to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(3, 0, 0)).unwrap_err();
        assert!(matches!(err, TxError::InvalidRequest(_)));

        let tx = fixtures::with_vote_registration(&fixtures::own_reward_address());
        assert!(to_ledger_payload(&tx, 764_824_073, FirmwareVersion::new(3, 0, 0)).is_ok());
    }
}

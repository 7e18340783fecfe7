//! Trezor `cardanoSignTransaction` request.

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

/// `CardanoAddressType` codes.
pub mod address_type {
    pub const BASE: u8 = 0;
    pub const POINTER: u8 = 4;
    pub const ENTERPRISE: u8 = 6;
    pub const BYRON: u8 = 8;
    pub const REWARD: u8 = 14;
}

/// `CardanoCertificateType` codes.
pub mod certificate_type {
    pub const STAKE_REGISTRATION: u8 = 0;
    pub const STAKE_DEREGISTRATION: u8 = 1;
    pub const STAKE_DELEGATION: u8 = 2;
}

pub const SIGNING_MODE_ORDINARY: u8 = 0;

fn address_type_code(kind: AddressKind) -> u8 {
    match kind {
        AddressKind::Base => address_type::BASE,
        AddressKind::Pointer => address_type::POINTER,
        AddressKind::Enterprise => address_type::ENTERPRISE,
        AddressKind::Byron => address_type::BYRON,
        AddressKind::Reward => address_type::REWARD,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<u32>>,
    pub prev_hash: String,
    pub prev_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorAddressParameters {
    pub address_type: u8,
    pub path: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking_path: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorTokenAmount {
    pub asset_name_bytes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorAssetGroup {
    pub policy_id: String,
    pub token_amounts: Vec<TrezorTokenAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_parameters: Option<TrezorAddressParameters>,
    pub amount: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub token_bundle: Vec<TrezorAssetGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorCertificate {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorWithdrawal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorVoteRegistration {
    pub vote_public_key: String,
    pub staking_path: Vec<u32>,
    pub reward_address_parameters: TrezorAddressParameters,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorAuxiliaryData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_vote_registration_parameters: Option<TrezorVoteRegistration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorRequiredSigner {
    pub key_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorSignRequest {
    pub signing_mode: u8,
    pub inputs: Vec<TrezorInput>,
    pub outputs: Vec<TrezorOutput>,
    pub fee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_interval_start: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub certificates: Vec<TrezorCertificate>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub withdrawals: Vec<TrezorWithdrawal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary_data: Option<TrezorAuxiliaryData>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mint: Vec<TrezorAssetGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required_signers: Vec<TrezorRequiredSigner>,
    pub protocol_magic: u32,
    pub network_id: u8,
}

fn token_bundle(value: &MultiToken) -> Vec<TrezorAssetGroup> {
    token_groups(value)
        .into_iter()
        .map(|(policy_id, tokens)| TrezorAssetGroup {
            policy_id,
            token_amounts: tokens
                .into_iter()
                .map(|(name, amount)| TrezorTokenAmount {
                    asset_name_bytes: name,
                    amount: Some(amount),
                    mint_amount: None,
                })
                .collect(),
        })
        .collect()
}

fn credential_fields(tx: &UnsignedTx, credential: &StakeCredential) -> Result<(Option<Vec<u32>>, Option<String>), TxError> {
    match credential {
        StakeCredential::KeyHash(_) => Ok((Some(staking_path(tx, "certificate")?), None)),
        StakeCredential::ScriptHash(h) => Ok((None, Some(h.clone()))),
    }
}

/// Translate `tx` for a Trezor running `version`.
pub fn to_trezor_payload(
    tx: &UnsignedTx,
    protocol_magic: u32,
    version: FirmwareVersion,
) -> Result<TrezorSignRequest, TxError> {
    check_features(tx, DeviceKind::Trezor, version)?;
    let body = &tx.built.body;

    let inputs = body
        .inputs
        .iter()
        .map(|i| TrezorInput {
            path: input_path(tx, &UtxoId::new(i.tx_hash.clone(), i.index)),
            prev_hash: i.tx_hash.clone(),
            prev_index: i.index,
        })
        .collect();

    let mut outputs = Vec::with_capacity(body.outputs.len());
    for o in &body.outputs {
        let (address, address_parameters) = match destination(tx, o)? {
            Destination::DeviceOwned { kind, path, staking_path } => (
                None,
                Some(TrezorAddressParameters {
                    address_type: address_type_code(kind),
                    path,
                    staking_path,
                }),
            ),
            Destination::ThirdParty { address } => (Some(address), None),
        };
        outputs.push(TrezorOutput {
            address,
            address_parameters,
            amount: lovelace_string(&o.amount),
            token_bundle: token_bundle(&o.amount),
            datum_hash: o.data_hash.clone(),
        });
    }

    let mut certificates = Vec::with_capacity(body.certificates.len());
    for cert in &body.certificates {
        let (path, script_hash) = credential_fields(tx, cert.credential())?;
        let (kind, pool) = match cert {
            Certificate::StakeRegistration { .. } => (certificate_type::STAKE_REGISTRATION, None),
            Certificate::StakeDeregistration { .. } => (certificate_type::STAKE_DEREGISTRATION, None),
            Certificate::StakeDelegation { pool_key_hash, .. } => {
                (certificate_type::STAKE_DELEGATION, Some(pool_key_hash.clone()))
            }
        };
        certificates.push(TrezorCertificate {
            kind,
            path,
            script_hash,
            pool,
        });
    }

    let mut withdrawals = Vec::with_capacity(body.withdrawals.len());
    for w in &body.withdrawals {
        let header = parse_header(&w.reward_address)?;
        let (path, script_hash) = if header.stake_is_script() {
            (None, Some(reward_address_credential(&w.reward_address)?))
        } else {
            (Some(staking_path(tx, "withdrawal")?), None)
        };
        withdrawals.push(TrezorWithdrawal {
            path,
            script_hash,
            amount: w.amount.to_string(),
        });
    }

    let auxiliary_data = match (device_vote_registration(tx)?, &body.auxiliary_data_hash) {
        (Some(reg), _) => {
            let path = staking_path(tx, "vote registration")?;
            Some(TrezorAuxiliaryData {
                hash: None,
                c_vote_registration_parameters: Some(TrezorVoteRegistration {
                    vote_public_key: reg.voting_key,
                    staking_path: path.clone(),
                    reward_address_parameters: TrezorAddressParameters {
                        address_type: address_type::REWARD,
                        path: path.clone(),
                        staking_path: Some(path),
                    },
                    nonce: reg.nonce.to_string(),
                }),
            })
        }
        (None, Some(hash)) => Some(TrezorAuxiliaryData {
            hash: Some(hash.clone()),
            c_vote_registration_parameters: None,
        }),
        (None, None) => None,
    };

    let mint = body
        .mint
        .iter()
        .map(|(policy_id, assets)| TrezorAssetGroup {
            policy_id: policy_id.clone(),
            token_amounts: assets
                .iter()
                .map(|(name, qty)| TrezorTokenAmount {
                    asset_name_bytes: name.clone(),
                    amount: None,
                    mint_amount: Some(qty.to_string()),
                })
                .collect(),
        })
        .collect();

    Ok(TrezorSignRequest {
        signing_mode: SIGNING_MODE_ORDINARY,
        inputs,
        outputs,
        fee: body.fee.to_string(),
        ttl: body.ttl.map(|t| t.to_string()),
        validity_interval_start: body.validity_start.map(|t| t.to_string()),
        certificates,
        withdrawals,
        auxiliary_data,
        mint,
        required_signers: body
            .required_signers
            .iter()
            .map(|k| TrezorRequiredSigner { key_hash: k.clone() })
            .collect(),
        protocol_magic,
        network_id: body.network_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fixtures;

    #[test]
    fn test_outputs_split_owned_and_third_party() {
        let tx = fixtures::build(true, false);
        let req = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).unwrap();
        assert_eq!(req.inputs.len(), 1);
        assert!(req.inputs[0].path.is_some());
        assert_eq!(req.outputs[0].address.as_deref(), Some(fixtures::RECEIVER));
        assert_eq!(req.outputs[0].token_bundle.len(), 1);
        assert_eq!(req.outputs[0].token_bundle[0].token_amounts[0].amount.as_deref(), Some("5"));
        let owned = req.outputs[1].address_parameters.as_ref().unwrap();
        assert_eq!(owned.address_type, address_type::BASE);
        assert!(owned.staking_path.is_some());
        assert_eq!(req.ttl.as_deref(), Some("5000"));
    }

    #[test]
    fn test_old_firmware_rejects_tokens() {
        let tx = fixtures::build(true, false);
        let err = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 3, 0)).unwrap_err();
        assert!(matches!(err, TxError::UnsupportedByDevice { .. }));
    }

    #[test]
    fn test_delegation_certificate() {
        let tx = fixtures::build(false, true);
        let req = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).unwrap();
        assert_eq!(req.certificates.len(), 1);
        assert_eq!(req.certificates[0].kind, certificate_type::STAKE_DELEGATION);
        assert_eq!(req.certificates[0].pool.as_deref(), Some("df".repeat(28).as_str()));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["certificates"][0]["type"], 2);
        assert_eq!(json["inputs"][0]["prev_index"], 1);
    }

    #[test]
    fn test_certificate_without_staking_path_fails() {
        let mut tx = fixtures::build(false, true);
        tx.staking_addressing = None;
        assert!(to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).is_err());
    }

    #[test]
    fn test_script_certificate_needs_newer_firmware() {
        let tx = fixtures::with_certificate_credential(StakeCredential::ScriptHash("f6".repeat(28)));
        let err = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 3, 2)).unwrap_err();
        assert!(matches!(err, TxError::UnsupportedByDevice { .. }));
        let req = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).unwrap();
        assert_eq!(req.certificates[0].script_hash.as_deref(), Some("f6".repeat(28).as_str()));
        assert!(req.certificates[0].path.is_none());
    }

    #[test]
    fn test_vote_registration_with_foreign_reward_address_fails() {
        let tx = fixtures::with_vote_registration(&format!("e1{}", "33".repeat(28)));
        let err = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).unwrap_err();
        assert!(matches!(err, TxError::InvalidRequest(_)));

        let tx = fixtures::with_vote_registration(&fixtures::own_reward_address());
        let req = to_trezor_payload(&tx, 764_824_073, FirmwareVersion::new(2, 4, 3)).unwrap();
        let reg = req.auxiliary_data.unwrap().c_vote_registration_parameters.unwrap();
        assert_eq!(reg.nonce, "42");
    }
}

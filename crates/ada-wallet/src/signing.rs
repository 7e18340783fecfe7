//! Local signing of assembled transactions.
//!
//! One witness per distinct input key path, plus the account staking key
//! when certificates or withdrawals require it. Every hash in
//! `needed_staking_key_hashes.required` must be matched by a witness whose
//! vkey hashes (Blake2b-224) to it, otherwise signing fails.

use crate::error::WalletError;
use crate::keystore::KeyStore;
use ada_tx::builder::Witness;
use ada_tx::{AuxiliaryData, UnsignedTx};
use ada_types::constants::KEY_HASH_SIZE;
use ada_types::Addressing;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Key derivation and signature scheme, supplied by the ledger library.
pub trait WitnessSigner {
    /// Sign `tx_hash` with the key at `addressing` below `root_key`.
    fn sign(&self, root_key: &[u8], addressing: &Addressing, tx_hash: &str) -> Result<Witness, WalletError>;
}

/// Transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTx {
    pub tx_hash: String,
    pub unsigned: UnsignedTx,
    pub witnesses: BTreeSet<Witness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_data: Option<AuxiliaryData>,
}

/// Blake2b-224 of a hex vkey.
pub fn key_hash(vkey_hex: &str) -> Result<String, WalletError> {
    let bytes = hex::decode(vkey_hex).map_err(|e| WalletError::Signing(format!("bad vkey: {}", e)))?;
    let digest = blake2b_simd::Params::new().hash_length(KEY_HASH_SIZE).hash(&bytes);
    Ok(hex::encode(digest.as_bytes()))
}

/// Sign `tx` with the root key in `store`.
pub fn sign_transaction<S: WitnessSigner + ?Sized>(
    tx: &UnsignedTx,
    store: &KeyStore,
    password: &[u8],
    signer: &S,
) -> Result<SignedTx, WalletError> {
    let root_key = store.unlock(password)?;
    let hash = tx.tx_hash();

    let mut paths: Vec<&Addressing> = Vec::new();
    for utxo in &tx.sender_utxos {
        if !paths.contains(&&utxo.addressing) {
            paths.push(&utxo.addressing);
        }
    }
    let mut witnesses: BTreeSet<Witness> = tx.needed_staking_key_hashes.gathered.clone();
    for addressing in paths {
        witnesses.insert(signer.sign(&root_key, addressing, hash)?);
    }

    let required = &tx.needed_staking_key_hashes.required;
    if !required.is_empty() {
        let staking = tx
            .staking_addressing
            .clone()
            .or_else(|| tx.sender_utxos.first().and_then(|u| u.addressing.staking_key()))
            .ok_or_else(|| WalletError::Signing("no staking key path for required hashes".into()))?;
        witnesses.insert(signer.sign(&root_key, &staking, hash)?);
    }

    let mut covered = BTreeSet::new();
    for w in &witnesses {
        covered.insert(key_hash(&w.vkey)?);
    }
    for h in required {
        if !covered.contains(h) {
            return Err(WalletError::MissingWitness(h.clone()));
        }
    }

    debug!("signed {} with {} witnesses", hash, witnesses.len());
    Ok(SignedTx {
        tx_hash: hash.to_string(),
        unsigned: tx.clone(),
        witnesses,
        auxiliary_data: tx.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_tx::{Assembler, BuildPlan, Certificate, ChangeReceiver, EstimatingLedger, StakeCredential};
    use ada_types::constants::{chain, purpose};
    use ada_types::{AddressedUtxo, MultiToken, Network, ProtocolParameters, Utxo};

    /// vkey = 32 bytes derived from the path, so key hashes are predictable.
    struct PathSigner;

    fn vkey_for(addressing: &Addressing) -> String {
        let digest = blake2b_simd::Params::new()
            .hash_length(32)
            .hash(addressing.to_path_string().as_bytes());
        hex::encode(digest.as_bytes())
    }

    impl WitnessSigner for PathSigner {
        fn sign(&self, _root: &[u8], addressing: &Addressing, tx_hash: &str) -> Result<Witness, WalletError> {
            Ok(Witness {
                vkey: vkey_for(addressing),
                signature: format!("{}{}", tx_hash, "00".repeat(32)),
            })
        }
    }

    fn build(credential_hash: String) -> UnsignedTx {
        let p = ProtocolParameters::for_network(Network::Mainnet);
        let plan = BuildPlan {
            candidates: vec![AddressedUtxo::new(
                Utxo {
                    tx_hash: "aa".repeat(32),
                    output_index: 0,
                    address: format!("01{}", "11".repeat(56)),
                    amount: MultiToken::from_default(1, 10_000_000u64),
                },
                Addressing::address(purpose::CIP1852, 0, chain::EXTERNAL, 0),
            )],
            change: vec![ChangeReceiver {
                address: format!("01{}", "22".repeat(56)),
                addressing: Addressing::address(purpose::CIP1852, 0, chain::INTERNAL, 0),
            }],
            certificates: vec![Certificate::StakeRegistration {
                credential: StakeCredential::KeyHash(credential_hash),
            }],
            ..Default::default()
        };
        Assembler::new(&EstimatingLedger, &p).build(plan).unwrap()
    }

    fn staking() -> Addressing {
        Addressing::address(purpose::CIP1852, 0, chain::STAKING, 0)
    }

    #[test]
    fn test_staking_witness_covers_required_hash() {
        let hash = key_hash(&vkey_for(&staking())).unwrap();
        let tx = build(hash);
        let store = KeyStore::create(b"root", b"pw").unwrap();
        let signed = sign_transaction(&tx, &store, b"pw", &PathSigner).unwrap();
        // input key + staking key
        assert_eq!(signed.witnesses.len(), 2);
        assert_eq!(signed.tx_hash, tx.tx_hash());
    }

    #[test]
    fn test_missing_required_witness() {
        let tx = build("44".repeat(28));
        let store = KeyStore::create(b"root", b"pw").unwrap();
        let err = sign_transaction(&tx, &store, b"pw", &PathSigner).unwrap_err();
        assert!(matches!(err, WalletError::MissingWitness(_)));
    }

    #[test]
    fn test_wrong_password_before_signing() {
        let tx = build("44".repeat(28));
        let store = KeyStore::create(b"root", b"pw").unwrap();
        let err = sign_transaction(&tx, &store, b"nope", &PathSigner).unwrap_err();
        assert!(matches!(err, WalletError::DecryptionFailed));
    }
}

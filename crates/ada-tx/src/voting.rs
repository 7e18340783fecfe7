//! CIP-15 vote registration metadata.
//!
//! The registration map goes under label 61284; its signature goes under
//! 61285 and is computed over the hash of the auxiliary data as it stands
//! before the signature label exists.

use crate::ledger::LedgerLib;
use crate::metadata::AuxiliaryData;
use crate::TxError;
use ada_types::constants::metadata_label::{VOTING_REGISTRATION, VOTING_SIGNATURE};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingRegistration {
    /// Catalyst voting public key (hex).
    pub voting_key: String,
    /// Stake public key (hex).
    pub staking_key: String,
    /// Reward address receiving voting rewards (hex).
    pub reward_address: String,
    /// Usually the current absolute slot.
    pub nonce: u64,
}

impl VotingRegistration {
    fn payload(&self) -> Value {
        json!({
            "1": format!("0x{}", self.voting_key),
            "2": format!("0x{}", self.staking_key),
            "3": format!("0x{}", self.reward_address),
            "4": self.nonce,
        })
    }

    /// Parse back from the 61284 payload.
    pub fn from_payload(value: &Value) -> Option<Self> {
        let field = |k: &str| {
            value
                .get(k)
                .and_then(Value::as_str)
                .map(|s| s.trim_start_matches("0x").to_string())
        };
        Some(Self {
            voting_key: field("1")?,
            staking_key: field("2")?,
            reward_address: field("3")?,
            nonce: value.get("4").and_then(Value::as_u64)?,
        })
    }
}

/// Signs the registration hash with the stake key.
pub trait RegistrationSigner {
    /// Return the hex signature over `hash_hex`.
    fn sign_registration(&self, hash_hex: &str) -> Result<String, TxError>;
}

/// Build registration auxiliary data in two passes.
pub fn registration_metadata<L: LedgerLib, S: RegistrationSigner>(
    ledger: &L,
    signer: &S,
    registration: &VotingRegistration,
) -> Result<AuxiliaryData, TxError> {
    let mut aux = AuxiliaryData::new();
    aux.insert(VOTING_REGISTRATION, registration.payload())?;

    let hash = ledger.hash_auxiliary_data(&aux);
    debug!("vote registration first-pass hash {}", hash);
    let signature = signer.sign_registration(&hash)?;

    aux.insert(VOTING_SIGNATURE, json!({ "1": format!("0x{}", signature) }))?;
    Ok(aux)
}

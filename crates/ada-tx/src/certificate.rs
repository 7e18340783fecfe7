//! Stake certificates.
//!
//! One variant per certificate kind, each carrying only the fields that kind
//! needs.

use ada_types::ProtocolParameters;
use serde::{Deserialize, Serialize};

/// Credential controlling a reward account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "hash")]
pub enum StakeCredential {
    KeyHash(String),
    ScriptHash(String),
}

impl StakeCredential {
    /// The key hash, if this credential is key-based.
    pub fn key_hash(&self) -> Option<&str> {
        match self {
            StakeCredential::KeyHash(h) => Some(h),
            StakeCredential::ScriptHash(_) => None,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            StakeCredential::KeyHash(h) | StakeCredential::ScriptHash(h) => h,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Certificate {
    StakeRegistration {
        credential: StakeCredential,
    },
    StakeDeregistration {
        credential: StakeCredential,
    },
    StakeDelegation {
        credential: StakeCredential,
        pool_key_hash: String,
    },
}

impl Certificate {
    pub fn credential(&self) -> &StakeCredential {
        match self {
            Certificate::StakeRegistration { credential }
            | Certificate::StakeDeregistration { credential }
            | Certificate::StakeDelegation { credential, .. } => credential,
        }
    }

    /// Deposit this certificate locks (consumed side).
    pub fn deposit(&self, params: &ProtocolParameters) -> u64 {
        match self {
            Certificate::StakeRegistration { .. } => params.key_deposit,
            _ => 0,
        }
    }

    /// Deposit this certificate releases (implicit input).
    pub fn refund(&self, params: &ProtocolParameters) -> u64 {
        match self {
            Certificate::StakeDeregistration { .. } => params.key_deposit,
            _ => 0,
        }
    }

    /// Whether the ledger demands a witness from the stake credential.
    pub fn needs_witness(&self) -> bool {
        !matches!(self, Certificate::StakeRegistration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_types::Network;

    fn cred() -> StakeCredential {
        StakeCredential::KeyHash("ab".repeat(28))
    }

    #[test]
    fn test_deposits_and_refunds() {
        let params = ProtocolParameters::for_network(Network::Mainnet);
        let reg = Certificate::StakeRegistration { credential: cred() };
        let dereg = Certificate::StakeDeregistration { credential: cred() };
        let deleg = Certificate::StakeDelegation {
            credential: cred(),
            pool_key_hash: "cd".repeat(28),
        };
        assert_eq!(reg.deposit(&params), 2_000_000);
        assert_eq!(reg.refund(&params), 0);
        assert_eq!(dereg.refund(&params), 2_000_000);
        assert_eq!(deleg.deposit(&params) + deleg.refund(&params), 0);
        assert!(!reg.needs_witness());
        assert!(deleg.needs_witness());
    }

    #[test]
    fn test_script_credential_has_no_key_hash() {
        let c = StakeCredential::ScriptHash("ee".repeat(28));
        assert!(c.key_hash().is_none());
        assert_eq!(c.hash().len(), 56);
    }
}

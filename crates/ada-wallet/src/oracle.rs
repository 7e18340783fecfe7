//! Capabilities the wallet core consumes from its collaborators.
//!
//! Address usage, foreign UTXO lookup and reward account state come from the
//! remote chain view and are async. Address generation is key arithmetic
//! provided by the ledger library and is synchronous.

use crate::error::WalletError;
use ada_types::{Utxo, UtxoId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Answers which of a set of addresses appear on chain.
#[async_trait]
pub trait AddressUsageOracle: Send + Sync {
    /// Return the used subset of `addresses`.
    async fn filter_used(&self, addresses: &[String]) -> Result<Vec<String>, WalletError>;
}

/// Derives payment addresses below an account key.
pub trait AddressGenerator: Send + Sync {
    /// `count` addresses on `chain` starting at `start`, in index order.
    fn generate(&self, account_key: &str, chain: u32, start: u32, count: u32) -> Result<Vec<String>, WalletError>;
}

/// Resolves outputs the wallet does not own.
#[async_trait]
pub trait ForeignUtxoFetcher: Send + Sync {
    /// One entry per id, `None` when the output does not exist.
    async fn fetch(&self, ids: &[UtxoId]) -> Result<Vec<Option<Utxo>>, WalletError>;
}

/// Reward account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub remaining_amount: u64,
}

#[async_trait]
pub trait AccountStateOracle: Send + Sync {
    /// State per reward address. Unregistered accounts map to `None`.
    async fn account_state(
        &self,
        reward_addresses: &[String],
    ) -> Result<HashMap<String, Option<AccountState>>, WalletError>;
}

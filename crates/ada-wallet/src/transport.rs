//! Oracle capabilities over the remote backend.

use crate::error::WalletError;
use crate::oracle::{AccountState, AccountStateOracle, AddressUsageOracle, ForeignUtxoFetcher};
use ada_rpc::BackendClient;
use ada_types::{Utxo, UtxoId};
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
impl AddressUsageOracle for BackendClient {
    async fn filter_used(&self, addresses: &[String]) -> Result<Vec<String>, WalletError> {
        Ok(self.filter_used_addresses(addresses).await?)
    }
}

#[async_trait]
impl ForeignUtxoFetcher for BackendClient {
    async fn fetch(&self, ids: &[UtxoId]) -> Result<Vec<Option<Utxo>>, WalletError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            found.push(self.utxo_at(id).await?);
        }
        Ok(found)
    }
}

#[async_trait]
impl AccountStateOracle for BackendClient {
    async fn account_state(
        &self,
        reward_addresses: &[String],
    ) -> Result<HashMap<String, Option<AccountState>>, WalletError> {
        let raw = BackendClient::account_state(self, reward_addresses).await?;
        let mut states = HashMap::with_capacity(raw.len());
        for (address, entry) in raw {
            let state = match entry {
                Some(e) => {
                    let remaining_amount = e.remaining_amount.parse::<u64>().map_err(|_| {
                        WalletError::Oracle(format!("bad remainingAmount {:?} for {}", e.remaining_amount, address))
                    })?;
                    Some(AccountState { remaining_amount })
                }
                None => None,
            };
            states.insert(address, state);
        }
        Ok(states)
    }
}

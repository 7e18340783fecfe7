//! Typed backend endpoints.
//!
//! Covers the queries the wallet core needs from the chain view:
//! `filterUsed`, single output lookup, reward account state, and best block.

use crate::client::{RpcClient, RpcConfig};
use crate::error::RpcError;
use crate::limits::{ACCOUNT_STATE_CHUNK, FILTER_USED_CHUNK};
use ada_types::multi_token::make_identifier;
use ada_types::{MultiToken, TokenEntry, Utxo, UtxoId};
use log::debug;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Response Types
// =============================================================================

/// `/api/v2/bestblock` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestBlock {
    pub epoch: u64,
    pub slot: u64,
    pub global_slot: u64,
    pub hash: String,
    pub height: u64,
}

/// One reward account in `/api/account/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStateEntry {
    pub remaining_amount: String,
    #[serde(default)]
    pub rewards: String,
    #[serde(default)]
    pub withdrawals: String,
    #[serde(default)]
    pub pool_operator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IoAsset {
    policy_id: String,
    name: String,
    amount: String,
}

/// `/api/txs/io/{hash}/o/{index}` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IoOutput {
    address: String,
    amount: String,
    #[serde(default)]
    assets: Vec<IoAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct IoResponse {
    output: Option<IoOutput>,
}

fn parse_amount(s: &str) -> Result<BigInt, RpcError> {
    s.parse()
        .map_err(|_| RpcError::Malformed(format!("bad amount {:?}", s)))
}

// =============================================================================
// Backend Client
// =============================================================================

/// Client for the wallet backend.
pub struct BackendClient {
    client: RpcClient,
    network_id: u8,
}

impl BackendClient {
    pub fn new(url: &str, network_id: u8) -> Self {
        Self {
            client: RpcClient::new(url),
            network_id,
        }
    }

    /// Create with full configuration.
    pub fn with_config(config: RpcConfig, network_id: u8) -> Self {
        Self {
            client: RpcClient::with_config(config),
            network_id,
        }
    }

    /// Get the underlying client for custom calls.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    /// Subset of `addresses` that appear in any transaction.
    pub async fn filter_used_addresses(&self, addresses: &[String]) -> Result<Vec<String>, RpcError> {
        let mut used = Vec::new();
        for chunk in addresses.chunks(FILTER_USED_CHUNK) {
            let val = self
                .client
                .post("/api/v2/addresses/filterUsed", &json!({ "addresses": chunk }))
                .await?;
            let batch: Vec<String> = serde_json::from_value(val)?;
            debug!("filterUsed: {}/{} used", batch.len(), chunk.len());
            used.extend(batch);
        }
        // keep request order and drop anything not asked about
        let used: HashSet<String> = used.into_iter().collect();
        Ok(addresses.iter().filter(|a| used.contains(*a)).cloned().collect())
    }

    /// Look up one output on chain. `None` if it does not exist.
    pub async fn utxo_at(&self, id: &UtxoId) -> Result<Option<Utxo>, RpcError> {
        let endpoint = format!("/api/txs/io/{}/o/{}", id.tx_hash, id.index);
        let val = match self.client.get(&endpoint).await {
            Ok(v) => v,
            Err(RpcError::HttpStatus { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let resp: IoResponse = serde_json::from_value(val)?;
        let Some(out) = resp.output else {
            return Ok(None);
        };

        let mut amount = MultiToken::from_default(self.network_id, parse_amount(&out.amount)?);
        for a in &out.assets {
            amount.add(TokenEntry::new(
                make_identifier(&a.policy_id, &a.name),
                self.network_id,
                parse_amount(&a.amount)?,
            ));
        }
        Ok(Some(Utxo {
            tx_hash: id.tx_hash.clone(),
            output_index: id.index,
            address: out.address,
            amount,
        }))
    }

    /// Reward account state per address; `None` for never-registered accounts.
    pub async fn account_state(
        &self,
        reward_addresses: &[String],
    ) -> Result<BTreeMap<String, Option<AccountStateEntry>>, RpcError> {
        let mut states = BTreeMap::new();
        for chunk in reward_addresses.chunks(ACCOUNT_STATE_CHUNK) {
            let val = self
                .client
                .post("/api/account/state", &json!({ "addresses": chunk }))
                .await?;
            let batch: BTreeMap<String, Option<AccountStateEntry>> = serde_json::from_value(val)?;
            states.extend(batch);
        }
        for a in reward_addresses {
            states.entry(a.clone()).or_insert(None);
        }
        Ok(states)
    }

    /// Current chain tip.
    pub async fn best_block(&self) -> Result<BestBlock, RpcError> {
        let val = self.client.get("/api/v2/bestblock").await?;
        Ok(serde_json::from_value(val)?)
    }
}

//! Submitted-transaction overlay.
//!
//! The chain view lags behind what the wallet has broadcast. `reconcile`
//! removes coins consumed by pending transactions and adds their outputs to
//! owned addresses, so the next build can spend change from an unconfirmed
//! transaction without double-spending.

use ada_types::{AddressedUtxo, Addressing, MultiToken, Utxo, UtxoId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmittedAddresses {
    /// Outputs in index order.
    pub to: Vec<(String, MultiToken)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    pub addresses: SubmittedAddresses,
}

/// A broadcast transaction not yet seen on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSubmittedTransaction {
    pub public_deriver_id: u32,
    pub txid: String,
    pub used_utxos: Vec<UtxoId>,
    pub transaction: SubmittedTransaction,
}

impl PersistedSubmittedTransaction {
    /// The outputs of this transaction as `(id, address, value)`.
    pub fn outputs(&self) -> impl Iterator<Item = (UtxoId, &str, &MultiToken)> + '_ {
        self.transaction
            .addresses
            .to
            .iter()
            .enumerate()
            .map(|(i, (addr, value))| (UtxoId::new(self.txid.clone(), i as u32), addr.as_str(), value))
    }
}

/// Effective spendable set for `public_deriver_id`.
///
/// Idempotent, and never yields the same identity twice.
pub fn reconcile(
    confirmed: &[AddressedUtxo],
    pending: &[PersistedSubmittedTransaction],
    owned: &HashMap<String, Addressing>,
    public_deriver_id: u32,
) -> Vec<AddressedUtxo> {
    let ours: Vec<&PersistedSubmittedTransaction> = pending
        .iter()
        .filter(|tx| tx.public_deriver_id == public_deriver_id)
        .collect();

    let spent: HashSet<&UtxoId> = ours.iter().flat_map(|tx| tx.used_utxos.iter()).collect();

    let mut seen: HashSet<UtxoId> = HashSet::new();
    let mut effective = Vec::with_capacity(confirmed.len());
    for utxo in confirmed {
        let id = utxo.id();
        if spent.contains(&id) {
            debug!("{} spent by a pending transaction", id);
            continue;
        }
        if !seen.insert(id.clone()) {
            warn!("duplicate confirmed utxo {} dropped", id);
            continue;
        }
        effective.push(utxo.clone());
    }

    for tx in ours {
        for (id, address, value) in tx.outputs() {
            if spent.contains(&id) || seen.contains(&id) {
                continue;
            }
            let Some(addressing) = owned.get(address) else {
                continue;
            };
            debug!("adding pending output {} to {}", id, address);
            seen.insert(id.clone());
            effective.push(AddressedUtxo::new(
                Utxo {
                    tx_hash: id.tx_hash,
                    output_index: id.index,
                    address: address.to_string(),
                    amount: value.clone(),
                },
                addressing.clone(),
            ));
        }
    }

    effective
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Pending list shared between the broadcaster and overlay readers.
#[derive(Debug, Default)]
pub struct SubmittedTxStore {
    entries: RwLock<Vec<PersistedSubmittedTransaction>>,
}

impl SubmittedTxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a broadcast. An entry with the same txid is replaced.
    pub async fn append(&self, tx: PersistedSubmittedTransaction) {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.txid == tx.txid) {
            debug!("replacing pending entry {}", tx.txid);
            *existing = tx;
        } else {
            entries.push(tx);
        }
    }

    /// Immutable copy for reconciliation.
    pub async fn snapshot(&self) -> Vec<PersistedSubmittedTransaction> {
        self.entries.read().await.clone()
    }

    /// Drop entries the chain view now reports. Returns how many were removed.
    pub async fn remove_confirmed(&self, txids: &[String]) -> usize {
        self.remove_where(txids).await
    }

    /// Drop entries the network refused.
    pub async fn remove_rejected(&self, txids: &[String]) -> usize {
        self.remove_where(txids).await
    }

    async fn remove_where(&self, txids: &[String]) -> usize {
        let txids: HashSet<&str> = txids.iter().map(String::as_str).collect();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !txids.contains(e.txid.as_str()));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Reconcile `confirmed` against a snapshot of this store.
    pub async fn reconcile(
        &self,
        confirmed: &[AddressedUtxo],
        owned: &HashMap<String, Addressing>,
        public_deriver_id: u32,
    ) -> Vec<AddressedUtxo> {
        let pending = self.snapshot().await;
        reconcile(confirmed, &pending, owned, public_deriver_id)
    }
}

//! Account restoration scanner.
//!
//! Each payment chain is walked in fixed-size batches from index 0. After
//! every batch the highest used index `k` is updated; the chain closes once
//! indices `0 ..= k + gap_limit` have all been examined. With no usage at
//! all the window is `0 .. gap_limit`.
//!
//! The external and internal chains run as two futures joined before the
//! derivation tree is built, so placeholder ids depend only on the oracle
//! answers and never on which chain finished first.

use crate::derivation::{DerivationTree, InsertPlan};
use crate::error::WalletError;
use crate::oracle::{AddressGenerator, AddressUsageOracle};
use ada_types::constants::{chain, DEFAULT_GAP_LIMIT, DEFAULT_SCAN_BATCH_SIZE};
use ada_types::Addressing;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub gap_limit: u32,
    pub batch_size: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            gap_limit: DEFAULT_GAP_LIMIT,
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

/// Result of scanning one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainScan {
    pub chain: u32,
    /// Addresses of the discovered window, index order.
    pub addresses: Vec<String>,
    pub last_used: Option<u32>,
}

impl ChainScan {
    /// Exclusive end of the discovered window.
    fn window_end(last_used: Option<u32>, gap_limit: u32) -> u32 {
        match last_used {
            Some(k) => k + gap_limit + 1,
            None => gap_limit,
        }
    }
}

/// Scan one payment chain.
///
/// Oracle failures surface as `ScanIncomplete`; the caller must restart the
/// chain from index 0.
pub async fn scan_chain<G, O>(
    account_key: &str,
    chain: u32,
    generator: &G,
    oracle: &O,
    config: ScanConfig,
    cancel: &AtomicBool,
) -> Result<ChainScan, WalletError>
where
    G: AddressGenerator + ?Sized,
    O: AddressUsageOracle + ?Sized,
{
    if config.batch_size == 0 || config.gap_limit == 0 {
        return Err(WalletError::Other("gap limit and batch size must be positive".into()));
    }

    let mut generated: Vec<String> = Vec::new();
    let mut last_used: Option<u32> = None;
    let mut start = 0u32;

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!("scan of chain {} cancelled at index {}", chain, start);
            return Err(WalletError::Cancelled);
        }

        let batch = generator.generate(account_key, chain, start, config.batch_size)?;
        if batch.len() != config.batch_size as usize {
            return Err(WalletError::AddressGeneration(format!(
                "asked for {} addresses, got {}",
                config.batch_size,
                batch.len()
            )));
        }

        let used: HashSet<String> = oracle
            .filter_used(&batch)
            .await
            .map_err(|e| WalletError::ScanIncomplete {
                chain,
                reason: e.to_string(),
            })?
            .into_iter()
            .collect();

        for (offset, address) in batch.iter().enumerate() {
            if used.contains(address) {
                last_used = Some(start + offset as u32);
            }
        }
        debug!(
            "chain {} batch {}..{}: {} used, last used {:?}",
            chain,
            start,
            start + config.batch_size,
            used.len(),
            last_used
        );
        generated.extend(batch);
        start += config.batch_size;

        if start >= ChainScan::window_end(last_used, config.gap_limit) {
            break;
        }
    }

    generated.truncate(ChainScan::window_end(last_used, config.gap_limit) as usize);
    info!(
        "chain {} closed: {} addresses, last used {:?}",
        chain,
        generated.len(),
        last_used
    );
    Ok(ChainScan {
        chain,
        addresses: generated,
        last_used,
    })
}

/// Scan both payment chains of `account` and build the insert plan.
pub async fn scan_account<G, O>(
    account: Addressing,
    account_key: &str,
    generator: &G,
    oracle: &O,
    config: ScanConfig,
    cancel: &AtomicBool,
) -> Result<InsertPlan, WalletError>
where
    G: AddressGenerator + ?Sized,
    O: AddressUsageOracle + ?Sized,
{
    let (external, internal) = tokio::try_join!(
        scan_chain(account_key, chain::EXTERNAL, generator, oracle, config, cancel),
        scan_chain(account_key, chain::INTERNAL, generator, oracle, config, cancel),
    )?;

    let mut tree = DerivationTree::new(account);
    for scan in [external, internal] {
        for (index, address) in scan.addresses.into_iter().enumerate() {
            tree.insert_address(scan.chain, index as u32, address);
        }
    }
    Ok(tree.flatten())
}

// ─── Per-account serialization ───────────────────────────────────────────────

/// Serializes restores of the same account.
///
/// An account's entry lives only while a restore holds or awaits it.
#[derive(Debug, Default)]
pub struct RestoreLocks {
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Exclusive access to one account; releasing it prunes the idle entry.
#[derive(Debug)]
pub struct RestoreGuard {
    account_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RestoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account_id`.
    pub async fn lock(&self, account_id: &str) -> RestoreGuard {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(account_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        RestoreGuard {
            account_id: account_id.to_string(),
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    /// Accounts currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // only the map's own handle left: nobody holds or waits
        if map.get(&self.account_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            map.remove(&self.account_id);
            debug!("restore lock for {} released", self.account_id);
        }
    }
}

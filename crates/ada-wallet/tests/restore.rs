use ada_types::address::harden;
use ada_types::constants::{chain, purpose, COIN_TYPE};
use ada_types::Addressing;
use ada_wallet::api::{restore_wallet_for_transfer, ApiError, RestoreRequest};
use ada_wallet::{scan_account, scan_chain, AddressGenerator, AddressUsageOracle, RestoreLocks, ScanConfig, WalletError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct PathGenerator;

impl AddressGenerator for PathGenerator {
    fn generate(&self, key: &str, chain: u32, start: u32, count: u32) -> Result<Vec<String>, WalletError> {
        Ok((start..start + count).map(|i| format!("{}/{}/{}", key, chain, i)).collect())
    }
}

/// Answers from a fixed used set and records every queried address.
struct FixedOracle {
    used: HashSet<String>,
    queried: Mutex<Vec<String>>,
}

impl FixedOracle {
    fn new(used: &[(u32, u32)]) -> Self {
        Self {
            used: used.iter().map(|(c, i)| format!("acct/{}/{}", c, i)).collect(),
            queried: Mutex::new(Vec::new()),
        }
    }

    fn queried_on(&self, chain: u32) -> Vec<u32> {
        let prefix = format!("acct/{}/", chain);
        self.queried
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| a.strip_prefix(&prefix).map(|i| i.parse().unwrap()))
            .collect()
    }
}

#[async_trait]
impl AddressUsageOracle for FixedOracle {
    async fn filter_used(&self, addresses: &[String]) -> Result<Vec<String>, WalletError> {
        self.queried.lock().unwrap().extend(addresses.iter().cloned());
        Ok(addresses.iter().filter(|a| self.used.contains(*a)).cloned().collect())
    }
}

struct FailingOracle;

#[async_trait]
impl AddressUsageOracle for FailingOracle {
    async fn filter_used(&self, _addresses: &[String]) -> Result<Vec<String>, WalletError> {
        Err(WalletError::Oracle("connection reset".into()))
    }
}

/// Raises the cancel flag once it has answered one batch.
struct CancellingOracle {
    cancel: Arc<AtomicBool>,
}

#[async_trait]
impl AddressUsageOracle for CancellingOracle {
    async fn filter_used(&self, addresses: &[String]) -> Result<Vec<String>, WalletError> {
        self.cancel.store(true, Ordering::Relaxed);
        // everything used, so the scan would otherwise continue
        Ok(addresses.to_vec())
    }
}

fn account() -> Addressing {
    Addressing::from_purpose(vec![purpose::CIP1852, COIN_TYPE, harden(0)])
}

#[tokio::test]
async fn test_gap_limit_termination() {
    let oracle = FixedOracle::new(&[(chain::EXTERNAL, 7)]);
    let cfg = ScanConfig { gap_limit: 5, batch_size: 4 };
    let cancel = AtomicBool::new(false);
    let scan = scan_chain("acct", chain::EXTERNAL, &PathGenerator, &oracle, cfg, &cancel)
        .await
        .unwrap();

    assert_eq!(scan.last_used, Some(7));
    // window 0..=7+5
    assert_eq!(scan.addresses.len(), 13);
    let queried = oracle.queried_on(chain::EXTERNAL);
    assert!(queried.contains(&12));
    // one batch past the window at most
    assert!(queried.iter().all(|&i| i < 12 + 4));
}

#[tokio::test]
async fn test_late_usage_extends_window() {
    // index 8 is within the gap after 3, so scanning must reach 8 + 5
    let oracle = FixedOracle::new(&[(chain::EXTERNAL, 3), (chain::EXTERNAL, 8)]);
    let cfg = ScanConfig { gap_limit: 5, batch_size: 4 };
    let cancel = AtomicBool::new(false);
    let scan = scan_chain("acct", chain::EXTERNAL, &PathGenerator, &oracle, cfg, &cancel)
        .await
        .unwrap();
    assert_eq!(scan.last_used, Some(8));
    assert_eq!(scan.addresses.len(), 14);
    assert_eq!(scan.addresses[13], "acct/0/13");
}

#[tokio::test]
async fn test_chains_scanned_independently() {
    let oracle = FixedOracle::new(&[(chain::INTERNAL, 15), (chain::EXTERNAL, 45)]);
    let cfg = ScanConfig { gap_limit: 20, batch_size: 20 };
    let cancel = AtomicBool::new(false);
    let plan = scan_account(account(), "acct", &PathGenerator, &oracle, cfg, &cancel)
        .await
        .unwrap();

    let found = plan.addresses();
    let external = found.iter().filter(|(_, a)| a.path[3] == chain::EXTERNAL).count();
    let internal = found.iter().filter(|(_, a)| a.path[3] == chain::INTERNAL).count();
    // 45 lies beyond the first gap and is never seen
    assert_eq!(external, 20);
    assert_eq!(internal, 36);
    let (addr, addressing) = &found[found.len() - 1];
    assert_eq!(addr, "acct/1/35");
    assert_eq!(addressing, &Addressing::address(purpose::CIP1852, 0, chain::INTERNAL, 35));
}

#[tokio::test]
async fn test_scan_is_deterministic() {
    let used = [(chain::EXTERNAL, 2), (chain::EXTERNAL, 19), (chain::INTERNAL, 4)];
    let cfg = ScanConfig { gap_limit: 10, batch_size: 7 };
    let cancel = AtomicBool::new(false);
    let first = scan_account(account(), "acct", &PathGenerator, &FixedOracle::new(&used), cfg, &cancel)
        .await
        .unwrap();
    let second = scan_account(account(), "acct", &PathGenerator, &FixedOracle::new(&used), cfg, &cancel)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.addresses(), second.addresses());
}

#[tokio::test]
async fn test_cancel_between_batches() {
    let cancel = Arc::new(AtomicBool::new(false));
    let oracle = CancellingOracle { cancel: cancel.clone() };
    let err = scan_chain("acct", chain::EXTERNAL, &PathGenerator, &oracle, ScanConfig::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Cancelled));
}

#[tokio::test]
async fn test_oracle_failure_is_scan_incomplete() {
    let locks = RestoreLocks::new();
    let cancel = AtomicBool::new(false);
    let req = RestoreRequest {
        account_key: "acct".into(),
        account: account(),
    };
    let err = restore_wallet_for_transfer(req, ScanConfig::default(), &PathGenerator, &FailingOracle, &locks, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ScanIncomplete(_)));
}

#[tokio::test]
async fn test_restore_for_transfer_lists_addresses() {
    let locks = RestoreLocks::new();
    let cancel = AtomicBool::new(false);
    let oracle = FixedOracle::new(&[(chain::EXTERNAL, 0)]);
    let req = RestoreRequest {
        account_key: "acct".into(),
        account: account(),
    };
    let cfg = ScanConfig { gap_limit: 3, batch_size: 3 };
    let resp = restore_wallet_for_transfer(req, cfg, &PathGenerator, &oracle, &locks, &cancel)
        .await
        .unwrap();
    // external 0..=3, internal 0..3
    assert_eq!(resp.addresses.len(), 7);
    assert_eq!(resp.addresses[0].0, "acct/0/0");
    assert_eq!(resp.addresses[0].1, Addressing::address(purpose::CIP1852, 0, chain::EXTERNAL, 0));
}

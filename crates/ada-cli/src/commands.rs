//! CLI command implementations.

use crate::AppContext;
use ada_rpc::BackendClient;
use ada_tx::hw::{DeviceKind, FirmwareVersion};
use ada_tx::{EstimatingLedger, UnsignedTx};
use ada_types::{AddressedUtxo, Addressing};
use ada_wallet::api::{reconcile_utxos, CreateUnsignedTxRequest};
use ada_wallet::{PersistedSubmittedTransaction, WalletApi};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&text).map_err(|e| format!("bad JSON in {}: {}", path.display(), e))?;
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> Result {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn backend(ctx: &AppContext) -> BackendClient {
    BackendClient::new(&ctx.config.backend_url, ctx.config.network.network_id())
}

// ─── Offline commands ───────────────────────────────────────────────────────

pub fn build(ctx: &AppContext, request: &Path) -> Result {
    let req: CreateUnsignedTxRequest = load_json(request)?;
    let api = WalletApi::new(&EstimatingLedger, &ctx.config);
    let tx = api.create_unsigned_tx(req)?;
    info!("built {} with fee {}", tx.tx_hash(), tx.fee());
    print_json(&tx)
}

pub fn reconcile(confirmed: &Path, pending: &Path, owned: &Path, deriver: u32) -> Result {
    let confirmed: Vec<AddressedUtxo> = load_json(confirmed)?;
    let pending: Vec<PersistedSubmittedTransaction> = load_json(pending)?;
    let owned: HashMap<String, Addressing> = load_json(owned)?;
    let effective = reconcile_utxos(&confirmed, &pending, &owned, deriver);
    info!("{} confirmed -> {} effective", confirmed.len(), effective.len());
    print_json(&effective)
}

pub fn hw_payload(ctx: &AppContext, tx: &Path, device: &str, firmware: &str) -> Result {
    let tx: UnsignedTx = load_json(tx)?;
    let device: DeviceKind = device.parse()?;
    let firmware: FirmwareVersion = firmware.parse()?;
    let api = WalletApi::new(&EstimatingLedger, &ctx.config);
    match device {
        DeviceKind::Trezor => print_json(&api.to_trezor_payload(&tx, firmware)?),
        DeviceKind::Ledger => print_json(&api.to_ledger_payload(&tx, firmware)?),
    }
}

// ─── Backend queries ────────────────────────────────────────────────────────

pub async fn filter_used(ctx: &AppContext, addresses: &[String]) -> Result {
    let used = backend(ctx).filter_used_addresses(addresses).await?;
    print_json(&used)
}

pub async fn account_state(ctx: &AppContext, addresses: &[String]) -> Result {
    let states = backend(ctx).account_state(addresses).await?;
    print_json(&states)
}

pub async fn best_block(ctx: &AppContext) -> Result {
    let tip = backend(ctx).best_block().await?;
    println!("Epoch:  {}", tip.epoch);
    println!("Slot:   {} (global {})", tip.slot, tip.global_slot);
    println!("Height: {}", tip.height);
    println!("Hash:   {}", tip.hash);
    Ok(())
}

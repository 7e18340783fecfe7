//! Wallet backend client.
//!
//! Async HTTP client for the remote chain view the wallet core consults:
//! address usage, single UTXO lookup, reward account state, and the chain
//! tip. Transient failures are retried with exponential backoff.
//!
//! # Example
//!
//! ```ignore
//! use ada_rpc::BackendClient;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = BackendClient::new("https://api.yoroiwallet.com", 1);
//!     let tip = backend.best_block().await.unwrap();
//!     println!("slot {}", tip.global_slot);
//! }
//! ```

pub mod error;
pub mod client;
pub mod backend;

pub use backend::{AccountStateEntry, BackendClient, BestBlock};
pub use client::{RpcClient, RpcConfig};
pub use error::RpcError;

/// Request limits of the backend.
pub mod limits {
    /// Addresses per `filterUsed` request.
    pub const FILTER_USED_CHUNK: usize = 50;
    /// Reward addresses per `account/state` request.
    pub const ACCOUNT_STATE_CHUNK: usize = 50;
}

//! Ada wallet core.
//!
//! Provides the submitted-transaction overlay, account restoration by
//! gap-limit scanning, the sealed root key store, local signing, and the
//! operations exposed to the API layer with their error taxonomy.

pub mod error;
pub mod oracle;
pub mod pending;
pub mod derivation;
pub mod restore;
pub mod keystore;
pub mod signing;
pub mod api;
#[cfg(feature = "transport")]
pub mod transport;

pub use api::{ApiError, WalletApi};
pub use derivation::{DerivationTree, InsertPlan, KeyDerivationId};
pub use error::WalletError;
pub use keystore::KeyStore;
pub use oracle::{AccountState, AccountStateOracle, AddressGenerator, AddressUsageOracle, ForeignUtxoFetcher};
pub use pending::{reconcile, PersistedSubmittedTransaction, SubmittedTxStore};
pub use restore::{scan_account, scan_chain, RestoreGuard, RestoreLocks, ScanConfig};
pub use signing::{sign_transaction, SignedTx, WitnessSigner};

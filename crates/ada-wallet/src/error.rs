//! Wallet error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Tx(#[from] ada_tx::TxError),

    #[error(transparent)]
    Types(#[from] ada_types::TypesError),

    #[cfg(feature = "transport")]
    #[error("backend error: {0}")]
    Rpc(#[from] ada_rpc::RpcError),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("address generation failed: {0}")]
    AddressGeneration(String),

    #[error("scan of chain {chain} incomplete: {reason}")]
    ScanIncomplete { chain: u32, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption failed (wrong password or corrupted data)")]
    DecryptionFailed,

    #[error("invalid key file: {0}")]
    InvalidFile(String),

    #[error("missing witness for required key hash {0}")]
    MissingWitness(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

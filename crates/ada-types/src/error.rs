//! Type-level error definitions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid token identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid utxo id: {0}")]
    InvalidUtxoId(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

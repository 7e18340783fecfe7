//! Transaction construction for the ada wallet backend.
//!
//! Provides the ledger-library capability traits the assembler drives, typed
//! certificates and auxiliary data, a size-estimating reference ledger,
//! coin selection ordering, the incremental transaction assembler, CIP-15
//! vote registration metadata, and translators from an assembled
//! transaction into hardware-wallet signing requests.

pub mod ledger;
pub mod certificate;
pub mod metadata;
pub mod fee;
pub mod selection;
pub mod builder;
pub mod voting;
pub mod hw;

pub use builder::{Assembler, BuildPlan, ChangeReceiver, InputSource, OutputTarget, UnsignedTx};
pub use certificate::{Certificate, StakeCredential};
pub use fee::EstimatingLedger;
pub use ledger::{BuiltTx, LedgerLib, TxBuilder, TxInput, TxOutput, Withdrawal};
pub use metadata::AuxiliaryData;
pub use selection::SelectionStrategy;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("output below minimum ada: need {required}, have {provided}")]
    OutputBelowMinimum { required: u64, provided: String },

    #[error("transaction too large: {size} bytes, limit {limit}")]
    TooLarge { size: usize, limit: u32 },

    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("ledger library error: {0}")]
    Ledger(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("{device} firmware {version} cannot sign: {feature}")]
    UnsupportedByDevice {
        device: String,
        version: String,
        feature: String,
    },

    #[error(transparent)]
    Types(#[from] ada_types::TypesError),

    #[error("{0}")]
    Other(String),
}

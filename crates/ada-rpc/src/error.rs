//! Backend client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{method} {url}: {source}")]
    Http {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: HTTP {status}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no result in response to {context}")]
    NoResult { context: String },

    #[error("authentication failed for {url}")]
    AuthFailed { url: String },

    #[error("backend busy: {context}")]
    Busy { context: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Types(#[from] ada_types::TypesError),

    #[error("{0}")]
    Other(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http { source, .. } => source.is_timeout() || source.is_connect() || source.is_request(),
            RpcError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            RpcError::Busy { .. } => true,
            _ => false,
        }
    }
}

use thiserror::Error;

/// Solana chain operation errors.
#[derive(Debug, Clone, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("blockhash expired before confirmation of {0}")]
    BlockhashExpired(String),
}

impl From<reqwest::Error> for SolError {
    fn from(e: reqwest::Error) -> Self {
        SolError::Transport(e.to_string())
    }
}

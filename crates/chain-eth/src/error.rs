use thiserror::Error;

/// Ethereum chain operation errors.
#[derive(Debug, Clone, Error)]
pub enum EthError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for EthError {
    fn from(e: reqwest::Error) -> Self {
        EthError::Transport(e.to_string())
    }
}

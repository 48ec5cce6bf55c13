use thiserror::Error;

/// Failures surfaced by balance reads and inscription submission.
///
/// Fetch boundaries flatten these into the `error` fields of their results;
/// submission routes them into the inscription state machine, where only
/// `UserRejected` leads to the `rejected` state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("User rejected the request.")]
    UserRejected,

    #[error("Chain execution failed: {0}")]
    ChainExecution(String),

    #[error("Wallet provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortfolioError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, PortfolioError::UserRejected)
    }
}

/// Errors reported by an injected wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The user declined the prompt (EIP-1193 code 4001).
    #[error("User rejected the request.")]
    UserRejected,

    /// The wallet does not know the requested chain (EIP-1193 code 4902).
    #[error("Unrecognized chain id {0}")]
    UnrecognizedChain(u64),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for PortfolioError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::UserRejected => PortfolioError::UserRejected,
            ProviderError::Execution(msg) => PortfolioError::ChainExecution(msg),
            other => PortfolioError::Provider(other.to_string()),
        }
    }
}

impl From<chain_eth::EthError> for PortfolioError {
    fn from(e: chain_eth::EthError) -> Self {
        use chain_eth::EthError;
        match e {
            EthError::InvalidAddress(_) => PortfolioError::Validation(e.to_string()),
            EthError::EncodingError(_) => PortfolioError::Internal(format!("ETH: {e}")),
            EthError::Transport(_)
            | EthError::Rpc { .. }
            | EthError::InvalidResponse(_)
            | EthError::Timeout(_) => PortfolioError::Network(format!("ETH: {e}")),
        }
    }
}

impl From<chain_sol::SolError> for PortfolioError {
    fn from(e: chain_sol::SolError) -> Self {
        use chain_sol::SolError;
        match e {
            SolError::InvalidAddress(_) => PortfolioError::Validation(e.to_string()),
            SolError::Transport(_) | SolError::Rpc { .. } | SolError::InvalidResponse(_) => {
                PortfolioError::Network(format!("SOL: {e}"))
            }
            SolError::TransactionFailed(_) | SolError::BlockhashExpired(_) => {
                PortfolioError::ChainExecution(format!("SOL: {e}"))
            }
            SolError::SignatureError(_) => PortfolioError::Provider(format!("SOL: {e}")),
            SolError::TransactionBuildError(_) | SolError::SerializationError(_) => {
                PortfolioError::Internal(format!("SOL: {e}"))
            }
        }
    }
}

use chain_sol::SolError;
use thiserror::Error;

/// Outcome categories reported to callers of the transaction manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Connection issue: {0}")]
    ConnectionIssue(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type TxResult<T> = Result<T, TxError>;

impl From<SolError> for TxError {
    fn from(e: SolError) -> Self {
        TxError::InternalError(format!("SOL: {e}"))
    }
}

impl From<serde_json::Error> for TxError {
    fn from(e: serde_json::Error) -> Self {
        TxError::InternalError(format!("serialization: {e}"))
    }
}

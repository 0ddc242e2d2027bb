use thiserror::Error;

/// Errors raised by the pure Solana encoding layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("instruction build error: {0}")]
    InstructionBuild(String),

    #[error("message build error: {0}")]
    MessageBuild(String),

    #[error("account decode error: {0}")]
    AccountDecode(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

use thiserror::Error;

/// Top-level error type for Lexzap.
#[derive(Debug, Error)]
pub enum ZapError {
    /// Error from the remote WhatsApp gateway (network or non-2xx response).
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Connection verification conflict (e.g. instance already paired).
    #[error("verification error: {0}")]
    Verification(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

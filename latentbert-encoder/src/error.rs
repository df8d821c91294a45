//! Error types for the latentbert encoder.

use thiserror::Error;

/// Result type alias for encoder operations.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Errors surfaced by configuration validation and the forward pass.
///
/// Every error is raised by the component that detects it and propagates to
/// the caller unchanged; nothing in the crate retries or substitutes
/// defaults.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Hyperparameter invariant violated at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Input rank or dimension does not match an operation's contract.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Token, segment, or position index exceeds its table bound.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// I/O failure while reading a configuration document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration document.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

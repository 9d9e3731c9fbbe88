use thiserror::Error;

/// Error type for JWT operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Failed to decode token: {0}")]
    DecodingFailed(String),

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token was signed with an unexpected algorithm")]
    AlgorithmMismatch,

    #[error("Token is expired")]
    TokenExpired,

    #[error("Token purpose mismatch: expected {expected}, got {actual}")]
    WrongPurpose { expected: String, actual: String },
}

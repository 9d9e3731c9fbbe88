use auth::PasswordError;
use thiserror::Error;

/// Error for AccountId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationStatusError {
    #[error("Unknown verification status: {0}")]
    Unknown(String),
}

/// Error for password reset delivery
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Failed to build message: {0}")]
    MessageBuildFailed(String),

    #[error("Failed to deliver message: {0}")]
    DeliveryFailed(String),
}

/// Top-level error for all identity and session operations
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid account ID: {0}")]
    InvalidAccountId(#[from] AccountIdError),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    // Domain-level errors
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Password too short: minimum {min} characters, got {actual}")]
    WeakCredential { min: usize, actual: usize },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account inactive")]
    AccountInactive,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // Infrastructure errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Credential hashing error: {0}")]
    Credential(String),

    #[error("Token issuance error: {0}")]
    TokenIssuance(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<PasswordError> for IdentityError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort { min, actual } => IdentityError::WeakCredential { min, actual },
            PasswordError::Mismatch => IdentityError::InvalidCredentials,
            other => IdentityError::Credential(other.to_string()),
        }
    }
}

//! Credential and token primitives for the identity service.
//!
//! - Password hashing (Argon2id) with a minimum length policy
//! - Purpose-scoped JWT tokens (access, refresh, reset), each with its own
//!   signing key and lifetime
//!
//! The service crate owns the policy (who gets a token, when a token is
//! stale); this crate only knows how to hash, sign and verify.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify(&hash, "my_password").is_ok());
//! assert!(hasher.verify(&hash, "not_my_password").is_err());
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{IssueClaims, TokenPurpose, TokenService, TokenServiceConfig};
//! use chrono::Utc;
//!
//! let tokens = TokenService::new(TokenServiceConfig::with_default_lifetimes(
//!     "access_secret_at_least_32_bytes_long!",
//!     "refresh_secret_at_least_32_bytes_long",
//!     "reset_secret_at_least_32_bytes_long!!",
//! ));
//!
//! let now = Utc::now();
//! let claims = IssueClaims::for_subject("user123").with_role("mentor");
//! let token = tokens.issue(TokenPurpose::Access, claims, now).unwrap();
//!
//! let decoded = tokens.verify(TokenPurpose::Access, &token, now).unwrap();
//! assert_eq!(decoded.sub, "user123");
//! assert!(tokens.verify(TokenPurpose::Refresh, &token, now).is_err());
//! ```

pub mod jwt;
pub mod password;

pub use jwt::IssueClaims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::TokenClaims;
pub use jwt::TokenPurpose;
pub use jwt::TokenService;
pub use jwt::TokenServiceConfig;
pub use jwt::TokenSettings;
pub use password::HashCost;
pub use password::PasswordError;
pub use password::PasswordHasher;

pub mod claims;
pub mod errors;
pub mod handler;
pub mod service;

pub use claims::IssueClaims;
pub use claims::TokenClaims;
pub use claims::TokenPurpose;
pub use errors::JwtError;
pub use handler::JwtHandler;
pub use service::TokenService;
pub use service::TokenServiceConfig;
pub use service::TokenSettings;

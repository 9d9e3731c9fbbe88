use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use super::claims::IssueClaims;
use super::claims::TokenClaims;
use super::claims::TokenPurpose;
use super::errors::JwtError;
use super::handler::JwtHandler;

pub const DEFAULT_ACCESS_LIFETIME_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_LIFETIME_MINUTES: i64 = 7 * 24 * 60;
pub const DEFAULT_RESET_LIFETIME_MINUTES: i64 = 15;

/// Signing key and lifetime for one token purpose.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub lifetime: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            lifetime,
        }
    }
}

/// Per-purpose settings for [`TokenService`].
#[derive(Clone)]
pub struct TokenServiceConfig {
    pub access: TokenSettings,
    pub refresh: TokenSettings,
    pub reset: TokenSettings,
}

impl TokenServiceConfig {
    /// Build a config with the default lifetimes
    /// (access 15 minutes, refresh 7 days, reset 15 minutes).
    pub fn with_default_lifetimes(
        access_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
        reset_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            access: TokenSettings::new(
                access_secret,
                Duration::minutes(DEFAULT_ACCESS_LIFETIME_MINUTES),
            ),
            refresh: TokenSettings::new(
                refresh_secret,
                Duration::minutes(DEFAULT_REFRESH_LIFETIME_MINUTES),
            ),
            reset: TokenSettings::new(
                reset_secret,
                Duration::minutes(DEFAULT_RESET_LIFETIME_MINUTES),
            ),
        }
    }

    /// Whether any two purposes were configured with the same secret.
    pub fn shares_secrets(&self) -> bool {
        self.access.secret == self.refresh.secret
            || self.access.secret == self.reset.secret
            || self.refresh.secret == self.reset.secret
    }
}

struct PurposeKey {
    handler: JwtHandler,
    lifetime: Duration,
}

impl PurposeKey {
    fn new(settings: &TokenSettings) -> Self {
        Self {
            handler: JwtHandler::new(&settings.secret),
            lifetime: settings.lifetime,
        }
    }
}

/// Issues and verifies stateless access, refresh and reset tokens.
///
/// Validity is purely a function of signature, purpose and expiry; there is
/// no revocation list. Callers that need revocation compare the `ver` claim
/// against their own record.
pub struct TokenService {
    access: PurposeKey,
    refresh: PurposeKey,
    reset: PurposeKey,
}

impl TokenService {
    pub fn new(config: TokenServiceConfig) -> Self {
        Self {
            access: PurposeKey::new(&config.access),
            refresh: PurposeKey::new(&config.refresh),
            reset: PurposeKey::new(&config.reset),
        }
    }

    /// Lifetime of tokens issued for `purpose`.
    pub fn lifetime(&self, purpose: TokenPurpose) -> Duration {
        self.key(purpose).lifetime
    }

    /// Sign a new token for `purpose`.
    ///
    /// `iat` is set to `now` and `exp` to `now + lifetime(purpose)`.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn issue(
        &self,
        purpose: TokenPurpose,
        claims: IssueClaims,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let key = self.key(purpose);
        let expires_at = now + key.lifetime;
        let claims = claims.into_claims(purpose, now.timestamp(), expires_at.timestamp());

        key.handler.encode(&claims)
    }

    /// Verify a token presented for `purpose` and return its claims.
    ///
    /// # Errors
    /// * `InvalidSignature` - Not signed with the key for `purpose`
    /// * `AlgorithmMismatch` - Signed with an algorithm other than HS256
    /// * `WrongPurpose` - Issued for a different purpose
    /// * `TokenExpired` - `now` is past the token's `exp`
    /// * `DecodingFailed` - Token is malformed
    pub fn verify(
        &self,
        purpose: TokenPurpose,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, JwtError> {
        let claims: TokenClaims = self.key(purpose).handler.decode(token)?;

        if claims.purpose != purpose {
            return Err(JwtError::WrongPurpose {
                expected: purpose.to_string(),
                actual: claims.purpose.to_string(),
            });
        }

        if claims.is_expired(now.timestamp()) {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }

    fn key(&self, purpose: TokenPurpose) -> &PurposeKey {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Reset => &self.reset,
        }
    }
}

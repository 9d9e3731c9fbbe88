use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// What a token may be used for.
///
/// Each purpose is signed with its own key and carries its own lifetime.
/// The purpose is also embedded in the claims, so tokens stay
/// non-interchangeable even when two purposes share a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    Reset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Reset => "reset",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every signed token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (account identifier)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Purpose the token was issued for
    pub purpose: TokenPurpose,

    /// Token generation of the subject at issuance time
    #[serde(default)]
    pub ver: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl TokenClaims {
    /// Check if token is expired.
    ///
    /// A token is still valid at exactly its expiration second.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

/// Facts about the subject to embed in a new token.
///
/// Fields that do not belong to the requested purpose are dropped on issue:
/// refresh tokens carry only the subject, reset tokens carry no role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueClaims {
    pub subject: String,
    pub version: i32,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl IssueClaims {
    /// Create claims for a subject.
    pub fn for_subject(subject: impl ToString) -> Self {
        Self {
            subject: subject.to_string(),
            ..Self::default()
        }
    }

    /// Set the subject's token generation.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Set email.
    pub fn with_email(mut self, email: impl ToString) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set role.
    pub fn with_role(mut self, role: impl ToString) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Build the full claim set for `purpose`.
    pub(crate) fn into_claims(self, purpose: TokenPurpose, iat: i64, exp: i64) -> TokenClaims {
        let (email, role) = match purpose {
            TokenPurpose::Access => (self.email, self.role),
            TokenPurpose::Refresh => (None, None),
            TokenPurpose::Reset => (self.email, None),
        };

        TokenClaims {
            sub: self.subject,
            iat,
            exp,
            purpose,
            ver: self.version,
            email,
            role,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::identity::errors::AccountIdError;
use crate::identity::errors::EmailError;
use crate::identity::errors::RoleError;
use crate::identity::errors::VerificationStatusError;

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Account aggregate entity.
///
/// The identity record a person signs in with. Owns exactly one profile and,
/// for mentors and mentees, one role profile.
#[derive(Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub profile_id: Option<ProfileId>,
    /// Generation counter embedded in issued tokens; bumped on password reset.
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a freshly registered account: active, unverified, never logged in.
    pub fn new(
        email: EmailAddress,
        password_hash: String,
        role: Role,
        profile_id: Option<ProfileId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            email,
            password_hash,
            role,
            is_verified: false,
            is_active: true,
            last_login_at: None,
            profile_id,
            token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[redacted]")
            .field("role", &self.role)
            .field("is_verified", &self.is_verified)
            .field("is_active", &self.is_active)
            .field("last_login_at", &self.last_login_at)
            .field("profile_id", &self.profile_id)
            .field("token_version", &self.token_version)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Account unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Generate a new random account ID.
    ///
    /// # Returns
    /// AccountId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an account ID from string.
    ///
    /// # Arguments
    /// * `s` - UUID string to parse
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, AccountIdError> {
        Uuid::parse_str(s)
            .map(AccountId)
            .map_err(|e| AccountIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Profile unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(pub Uuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser. Stored and compared
/// exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Arguments
    /// * `email` - Raw email string
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Mentor,
    Mentee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mentor => "mentor",
            Role::Mentee => "mentee",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentor" => Ok(Role::Mentor),
            "mentee" => Ok(Role::Mentee),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public profile shared by every account kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
    pub image_url: String,
    pub bio: String,
    pub headline: String,
    pub website_url: String,
    pub linkedin_url: String,
    pub twitter: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build a new profile from registration fields.
    ///
    /// A missing avatar is derived from the display name and a missing
    /// timezone defaults to UTC.
    pub fn new(fields: ProfileFields, now: DateTime<Utc>) -> Self {
        let avatar_url = match fields.avatar_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => default_avatar_url(&fields.first_name, &fields.last_name),
        };
        let timezone = match fields.timezone {
            Some(timezone) if !timezone.trim().is_empty() => timezone,
            _ => DEFAULT_TIMEZONE.to_string(),
        };

        Self {
            id: ProfileId::new(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            avatar_url,
            image_url: fields.image_url,
            bio: fields.bio,
            headline: fields.headline,
            website_url: fields.website_url,
            linkedin_url: fields.linkedin_url,
            twitter: fields.twitter,
            timezone,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile data supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub image_url: String,
    pub bio: String,
    pub headline: String,
    pub website_url: String,
    pub linkedin_url: String,
    pub twitter: String,
    pub timezone: Option<String>,
}

impl ProfileFields {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }
}

/// Generated avatar for a display name.
pub fn default_avatar_url(first_name: &str, last_name: &str) -> String {
    let name = format!("{} {}", first_name.trim(), last_name.trim());
    let escaped: String = url::form_urlencoded::byte_serialize(name.trim().as_bytes()).collect();

    format!(
        "{}?name={}&background=random&rounded=true",
        AVATAR_BASE_URL, escaped
    )
}

/// Review state of a mentor's credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = VerificationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(VerificationStatus::Unverified),
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            other => Err(VerificationStatusError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mentor-specific registration data.
#[derive(Debug, Clone, PartialEq)]
pub struct MentorFields {
    pub intro_video_url: String,
    pub podcast_url: String,
    pub expertise_area: String,
    pub industry: String,
    pub years_of_experience: Option<i32>,
    pub calendly_link: String,
    pub hourly_rate: f64,
    pub is_accepting_new_mentees: bool,
    pub available_days: Value,
    pub available_time_slots: Value,
}

impl Default for MentorFields {
    fn default() -> Self {
        Self {
            intro_video_url: String::new(),
            podcast_url: String::new(),
            expertise_area: String::new(),
            industry: String::new(),
            years_of_experience: None,
            calendly_link: String::new(),
            hourly_rate: 0.0,
            is_accepting_new_mentees: true,
            available_days: Value::Null,
            available_time_slots: Value::Null,
        }
    }
}

/// Mentee-specific registration data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenteeFields {
    pub current_role: String,
    pub current_company: String,
    pub learning_goals: Value,
    pub interests: Value,
    pub skill_level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentorProfile {
    pub id: Uuid,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub verification_status: VerificationStatus,
    pub fields: MentorFields,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenteeProfile {
    pub id: Uuid,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub fields: MenteeFields,
    pub created_at: DateTime<Utc>,
}

/// Role-specific extension of an account. The variant never changes after
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleProfile {
    Mentor(MentorProfile),
    Mentee(MenteeProfile),
}

impl RoleProfile {
    pub fn account_id(&self) -> AccountId {
        match self {
            RoleProfile::Mentor(mentor) => mentor.account_id,
            RoleProfile::Mentee(mentee) => mentee.account_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Mentor(_) => Role::Mentor,
            RoleProfile::Mentee(_) => Role::Mentee,
        }
    }
}

/// Role chosen at registration together with the data that role requires.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleRegistration {
    Mentor(MentorFields),
    Mentee(MenteeFields),
    Admin,
}

impl RoleRegistration {
    pub fn role(&self) -> Role {
        match self {
            RoleRegistration::Mentor(_) => Role::Mentor,
            RoleRegistration::Mentee(_) => Role::Mentee,
            RoleRegistration::Admin => Role::Admin,
        }
    }

    /// Build the role profile for a new account, if the role has one.
    ///
    /// New mentors always start unverified.
    pub fn into_role_profile(
        self,
        account_id: AccountId,
        profile_id: ProfileId,
        now: DateTime<Utc>,
    ) -> Option<RoleProfile> {
        match self {
            RoleRegistration::Mentor(fields) => Some(RoleProfile::Mentor(MentorProfile {
                id: Uuid::new_v4(),
                account_id,
                profile_id,
                verification_status: VerificationStatus::Unverified,
                fields,
                created_at: now,
            })),
            RoleRegistration::Mentee(fields) => Some(RoleProfile::Mentee(MenteeProfile {
                id: Uuid::new_v4(),
                account_id,
                profile_id,
                fields,
                created_at: now,
            })),
            RoleRegistration::Admin => None,
        }
    }
}

/// Command to register a new account with domain types
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub password: String,
    pub registration: RoleRegistration,
    pub profile: ProfileFields,
}

impl RegisterCommand {
    /// Construct a new register command.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `password` - Plain text password (will be hashed by service)
    /// * `registration` - Role and role-specific fields
    /// * `profile` - Profile fields
    pub fn new(
        email: EmailAddress,
        password: String,
        registration: RoleRegistration,
        profile: ProfileFields,
    ) -> Self {
        Self {
            email,
            password,
            registration,
            profile,
        }
    }
}

impl fmt::Debug for RegisterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterCommand")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("registration", &self.registration)
            .field("profile", &self.profile)
            .finish()
    }
}

pub struct LoginCommand {
    pub email: EmailAddress,
    pub password: String,
}

impl LoginCommand {
    pub fn new(email: EmailAddress, password: String) -> Self {
        Self { email, password }
    }
}

impl fmt::Debug for LoginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCommand")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Signed-in account with a fresh token pair.
#[derive(Clone)]
pub struct Session {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Account together with its profile records.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDetails {
    pub account: Account,
    pub profile: Option<Profile>,
    pub role_profile: Option<RoleProfile>,
}

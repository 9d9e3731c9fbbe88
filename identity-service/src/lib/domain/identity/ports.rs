use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::identity::errors::IdentityError;
use crate::identity::errors::NotifierError;
use crate::identity::models::Account;
use crate::identity::models::AccountDetails;
use crate::identity::models::AccountId;
use crate::identity::models::EmailAddress;
use crate::identity::models::LoginCommand;
use crate::identity::models::Profile;
use crate::identity::models::ProfileId;
use crate::identity::models::RegisterCommand;
use crate::identity::models::RoleProfile;
use crate::identity::models::Session;

/// Port for identity and session operations.
#[async_trait]
pub trait IdentityServicePort: Send + Sync + 'static {
    /// Register a new account with its profile and role profile.
    ///
    /// # Arguments
    /// * `command` - Validated email, password, role data and profile fields
    ///
    /// # Returns
    /// Session for the new account
    ///
    /// # Errors
    /// * `EmailTaken` - Email is already registered
    /// * `WeakCredential` - Password is too short
    /// * `Storage` - Persisting the records failed (nothing is kept)
    async fn register(&self, command: RegisterCommand) -> Result<Session, IdentityError>;

    /// Verify credentials and open a session.
    ///
    /// # Arguments
    /// * `command` - Email and plain text password
    ///
    /// # Returns
    /// Session with fresh access and refresh tokens
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password
    /// * `AccountInactive` - Account has been deactivated
    /// * `Storage` - Database operation failed
    async fn login(&self, command: LoginCommand) -> Result<Session, IdentityError>;

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Arguments
    /// * `refresh_token` - Signed refresh token
    ///
    /// # Returns
    /// Session with a new access and refresh token
    ///
    /// # Errors
    /// * `InvalidToken` - Token is invalid, expired, or predates a password reset
    /// * `AccountNotFound` - Token subject no longer exists
    /// * `AccountInactive` - Account has been deactivated
    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    /// Issue a password reset token and email the reset link.
    ///
    /// # Arguments
    /// * `email` - Address of the account to reset
    ///
    /// # Returns
    /// The reset token (also delivered through the notifier)
    ///
    /// # Errors
    /// * `AccountNotFound` - No account with this email
    /// * `TokenIssuance` - Token signing failed
    async fn forgot_password(&self, email: &EmailAddress) -> Result<String, IdentityError>;

    /// Replace the password of the account named by a reset token.
    ///
    /// # Arguments
    /// * `reset_token` - Signed reset token
    /// * `new_password` - Plain text replacement password
    ///
    /// # Errors
    /// * `InvalidOrExpiredToken` - Token is invalid, expired, or already used
    /// * `AccountNotFound` - Token subject no longer exists
    /// * `WeakCredential` - New password is too short
    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: String,
    ) -> Result<(), IdentityError>;

    /// Retrieve an account with its profile records.
    ///
    /// # Errors
    /// * `AccountNotFound` - Account does not exist
    /// * `Storage` - Database operation failed
    async fn get_account(&self, id: &AccountId) -> Result<AccountDetails, IdentityError>;
}

/// Persistence operations for accounts and their profiles.
///
/// Lookups return `Ok(None)` for missing records and never see soft-deleted rows.
#[async_trait]
pub trait IdentityRepository: Send + Sync + 'static {
    /// Start a unit of work for multi-record writes.
    ///
    /// # Errors
    /// * `Storage` - Could not open a transaction
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IdentityError>;

    /// Retrieve account by email address.
    ///
    /// # Arguments
    /// * `email` - Email address, matched exactly
    ///
    /// # Returns
    /// Optional account entity (None if not found)
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError>;

    /// Retrieve account by identifier.
    ///
    /// # Returns
    /// Optional account entity (None if not found)
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError>;

    /// Check whether an email is already held by an account.
    ///
    /// Soft-deleted accounts still hold their email.
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, IdentityError>;

    /// Record a successful login.
    ///
    /// # Errors
    /// * `AccountNotFound` - Account does not exist
    /// * `Storage` - Database operation failed
    async fn update_login_time(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityError>;

    /// Replace the password hash and bump the token version.
    ///
    /// The write only happens while the stored token version still equals
    /// `expected_version`.
    ///
    /// # Returns
    /// Whether the account was updated
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        expected_version: i32,
    ) -> Result<bool, IdentityError>;

    /// Retrieve profile by identifier.
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, IdentityError>;

    /// Retrieve the mentor or mentee profile owned by an account.
    ///
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn find_role_profile(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<RoleProfile>, IdentityError>;
}

/// Atomic group of writes opened by [`IdentityRepository::begin`].
///
/// Nothing staged is visible until `commit` succeeds. Dropping an unfinished
/// unit discards it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// # Errors
    /// * `Storage` - Database operation failed
    async fn create_profile(&mut self, profile: &Profile) -> Result<(), IdentityError>;

    /// # Errors
    /// * `EmailTaken` - Email uniqueness constraint violated
    /// * `Storage` - Database operation failed
    async fn create_account(&mut self, account: &Account) -> Result<(), IdentityError>;

    /// # Errors
    /// * `Storage` - Database operation failed
    async fn create_role_profile(&mut self, role_profile: &RoleProfile)
        -> Result<(), IdentityError>;

    /// Make every staged write visible at once.
    ///
    /// # Errors
    /// * `EmailTaken` - A concurrent registration claimed the email first
    /// * `Storage` - Commit failed or the unit was already finished
    async fn commit(&mut self) -> Result<(), IdentityError>;

    /// Discard every staged write.
    ///
    /// # Errors
    /// * `Storage` - Rollback failed
    async fn rollback(&mut self) -> Result<(), IdentityError>;
}

/// Out-of-band delivery of account notifications.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Send a password reset link.
    ///
    /// # Arguments
    /// * `to` - Recipient address
    /// * `reset_link` - Link embedding the reset token
    ///
    /// # Errors
    /// * `MessageBuildFailed` - Message could not be built
    /// * `DeliveryFailed` - Transport rejected or failed to deliver the message
    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        reset_link: &str,
    ) -> Result<(), NotifierError>;
}

use std::sync::Arc;

use async_trait::async_trait;
use auth::IssueClaims;
use auth::PasswordHasher;
use auth::TokenClaims;
use auth::TokenPurpose;
use auth::TokenService;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::OnceCell;
use url::Url;

use crate::identity::errors::IdentityError;
use crate::identity::models::Account;
use crate::identity::models::AccountDetails;
use crate::identity::models::AccountId;
use crate::identity::models::EmailAddress;
use crate::identity::models::LoginCommand;
use crate::identity::models::Profile;
use crate::identity::models::RegisterCommand;
use crate::identity::models::RoleProfile;
use crate::identity::models::Session;
use crate::identity::ports::IdentityRepository;
use crate::identity::ports::IdentityServicePort;
use crate::identity::ports::Notifier;
use crate::identity::ports::UnitOfWork;

/// Domain service implementation for identity and session operations.
///
/// Concrete implementation of IdentityServicePort with dependency injection.
pub struct IdentityService<R, N>
where
    R: IdentityRepository,
    N: Notifier,
{
    repository: Arc<R>,
    notifier: Arc<N>,
    password_hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
    reset_url: Url,
    /// Hash verified against when no account matches a login email, so an
    /// unknown email costs the same Argon2 work as a wrong password.
    dummy_hash: OnceCell<String>,
}

const DUMMY_PASSWORD: &str = "mentorspath-dummy-credential";

impl<R, N> IdentityService<R, N>
where
    R: IdentityRepository,
    N: Notifier,
{
    /// Create a new identity service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Account persistence implementation
    /// * `notifier` - Password reset delivery implementation
    /// * `password_hasher` - Credential hasher
    /// * `tokens` - Token signing and verification
    /// * `reset_url` - Page that accepts the `token` query parameter
    ///
    /// # Returns
    /// Configured identity service instance
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        password_hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenService>,
        reset_url: Url,
    ) -> Self {
        Self {
            repository,
            notifier,
            password_hasher,
            tokens,
            reset_url,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, IdentityError> {
        let hasher = Arc::clone(&self.password_hasher);

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| IdentityError::Unknown(format!("Hashing task failed: {}", e)))?
            .map_err(IdentityError::from)
    }

    async fn verify_password(&self, hash: String, password: String) -> Result<(), IdentityError> {
        let hasher = Arc::clone(&self.password_hasher);

        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| IdentityError::Unknown(format!("Verification task failed: {}", e)))?
            .map_err(IdentityError::from)
    }

    async fn dummy_hash(&self) -> Result<&str, IdentityError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD.to_string()))
            .await
            .map(String::as_str)
    }

    /// Burn one verification for an unknown email, then reject.
    async fn reject_unknown_email(&self, password: String) -> IdentityError {
        match self.dummy_hash().await {
            Ok(hash) => {
                if let Err(e) = self.verify_password(hash.to_string(), password).await {
                    tracing::trace!(error = %e, "Dummy verification finished");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to prepare dummy hash"),
        }

        IdentityError::InvalidCredentials
    }

    fn open_session(&self, account: Account, now: DateTime<Utc>) -> Result<Session, IdentityError> {
        let claims = IssueClaims::for_subject(account.id)
            .with_version(account.token_version)
            .with_email(account.email.as_str())
            .with_role(account.role.as_str());

        let access_token = self
            .tokens
            .issue(TokenPurpose::Access, claims.clone(), now)
            .map_err(|e| IdentityError::TokenIssuance(e.to_string()))?;
        let refresh_token = self
            .tokens
            .issue(TokenPurpose::Refresh, claims, now)
            .map_err(|e| IdentityError::TokenIssuance(e.to_string()))?;

        Ok(Session {
            account,
            access_token,
            refresh_token,
            expires_in: self.tokens.lifetime(TokenPurpose::Access).num_seconds(),
        })
    }

    /// Resolve the account a verified token was issued to, rejecting tokens
    /// minted before the account's last password reset.
    async fn token_subject(
        &self,
        claims: &TokenClaims,
        stale: IdentityError,
    ) -> Result<Account, IdentityError> {
        let account_id = AccountId::from_string(&claims.sub).map_err(|_| stale.clone())?;

        let account = self
            .repository
            .find_by_id(&account_id)
            .await?
            .ok_or_else(|| IdentityError::AccountNotFound(account_id.to_string()))?;

        if claims.ver != account.token_version {
            tracing::debug!(
                account_id = %account.id,
                token_version = claims.ver,
                current_version = account.token_version,
                "Rejected token from an earlier generation"
            );
            return Err(stale);
        }

        Ok(account)
    }

    fn reset_link(&self, token: &str) -> String {
        let mut link = self.reset_url.clone();
        link.query_pairs_mut().append_pair("token", token);
        link.to_string()
    }
}

async fn stage_registration(
    unit: &mut dyn UnitOfWork,
    profile: &Profile,
    account: &Account,
    role_profile: Option<&RoleProfile>,
) -> Result<(), IdentityError> {
    unit.create_profile(profile).await?;
    unit.create_account(account).await?;
    if let Some(role_profile) = role_profile {
        unit.create_role_profile(role_profile).await?;
    }
    Ok(())
}

#[async_trait]
impl<R, N> IdentityServicePort for IdentityService<R, N>
where
    R: IdentityRepository,
    N: Notifier,
{
    async fn register(&self, command: RegisterCommand) -> Result<Session, IdentityError> {
        if self.repository.email_exists(&command.email).await? {
            return Err(IdentityError::EmailTaken(command.email.to_string()));
        }

        let password_hash = self.hash_password(command.password).await?;

        let now = Utc::now();
        let profile = Profile::new(command.profile, now);
        let account = Account::new(
            command.email,
            password_hash,
            command.registration.role(),
            Some(profile.id),
            now,
        );
        let role_profile = command
            .registration
            .into_role_profile(account.id, profile.id, now);

        let mut unit = self.repository.begin().await?;
        if let Err(e) =
            stage_registration(unit.as_mut(), &profile, &account, role_profile.as_ref()).await
        {
            if let Err(rollback_error) = unit.rollback().await {
                tracing::error!(
                    account_id = %account.id,
                    error = %rollback_error,
                    "Failed to roll back registration"
                );
            }
            return Err(e);
        }
        unit.commit().await?;

        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            "Account registered"
        );

        self.open_session(account, now)
    }

    async fn login(&self, command: LoginCommand) -> Result<Session, IdentityError> {
        let mut account = match self.repository.find_by_email(&command.email).await? {
            Some(account) => account,
            None => return Err(self.reject_unknown_email(command.password).await),
        };

        if !account.is_active {
            return Err(IdentityError::AccountInactive);
        }

        self.verify_password(account.password_hash.clone(), command.password)
            .await?;

        let now = Utc::now();
        self.repository.update_login_time(&account.id, now).await?;
        account.last_login_at = Some(now);

        tracing::info!(account_id = %account.id, "Account logged in");

        self.open_session(account, now)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let now = Utc::now();
        let claims = self
            .tokens
            .verify(TokenPurpose::Refresh, refresh_token, now)
            .map_err(|e| {
                tracing::debug!(error = %e, "Refresh token rejected");
                IdentityError::InvalidToken
            })?;

        let account = self
            .token_subject(&claims, IdentityError::InvalidToken)
            .await?;

        if !account.is_active {
            return Err(IdentityError::AccountInactive);
        }

        self.open_session(account, now)
    }

    async fn forgot_password(&self, email: &EmailAddress) -> Result<String, IdentityError> {
        let account = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| IdentityError::AccountNotFound(email.to_string()))?;

        let claims = IssueClaims::for_subject(account.id)
            .with_version(account.token_version)
            .with_email(account.email.as_str());
        let token = self
            .tokens
            .issue(TokenPurpose::Reset, claims, Utc::now())
            .map_err(|e| IdentityError::TokenIssuance(e.to_string()))?;

        if let Err(e) = self
            .notifier
            .send_password_reset(&account.email, &self.reset_link(&token))
            .await
        {
            tracing::error!(
                account_id = %account.id,
                error = %e,
                "Failed to send password reset email"
            );
        }

        Ok(token)
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: String,
    ) -> Result<(), IdentityError> {
        let claims = self
            .tokens
            .verify(TokenPurpose::Reset, reset_token, Utc::now())
            .map_err(|e| {
                tracing::debug!(error = %e, "Reset token rejected");
                IdentityError::InvalidOrExpiredToken
            })?;

        let account = self
            .token_subject(&claims, IdentityError::InvalidOrExpiredToken)
            .await?;

        let password_hash = self.hash_password(new_password).await?;

        // A concurrent reset with the same token loses here
        let updated = self
            .repository
            .update_password_hash(&account.id, &password_hash, account.token_version)
            .await?;
        if !updated {
            return Err(IdentityError::InvalidOrExpiredToken);
        }

        tracing::info!(account_id = %account.id, "Password reset");

        Ok(())
    }

    async fn get_account(&self, id: &AccountId) -> Result<AccountDetails, IdentityError> {
        let account = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| IdentityError::AccountNotFound(id.to_string()))?;

        let profile = match account.profile_id {
            Some(profile_id) => self.repository.find_profile(&profile_id).await?,
            None => None,
        };
        let role_profile = self.repository.find_role_profile(&account.id).await?;

        Ok(AccountDetails {
            account,
            profile,
            role_profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use auth::HashCost;
    use auth::TokenServiceConfig;
    use chrono::Duration;
    use mockall::mock;
    use mockall::predicate::*;

    use super::*;
    use crate::identity::errors::NotifierError;
    use crate::identity::models::MenteeFields;
    use crate::identity::models::MentorFields;
    use crate::identity::models::ProfileFields;
    use crate::identity::models::ProfileId;
    use crate::identity::models::Role;
    use crate::identity::models::RoleRegistration;

    mock! {
        pub TestIdentityRepository {}

        #[async_trait]
        impl IdentityRepository for TestIdentityRepository {
            async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IdentityError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError>;
            async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError>;
            async fn email_exists(&self, email: &EmailAddress) -> Result<bool, IdentityError>;
            async fn update_login_time(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), IdentityError>;
            async fn update_password_hash(&self, id: &AccountId, password_hash: &str, expected_version: i32) -> Result<bool, IdentityError>;
            async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, IdentityError>;
            async fn find_role_profile(&self, account_id: &AccountId) -> Result<Option<RoleProfile>, IdentityError>;
        }
    }

    mock! {
        pub TestUnitOfWork {}

        #[async_trait]
        impl UnitOfWork for TestUnitOfWork {
            async fn create_profile(&mut self, profile: &Profile) -> Result<(), IdentityError>;
            async fn create_account(&mut self, account: &Account) -> Result<(), IdentityError>;
            async fn create_role_profile(&mut self, role_profile: &RoleProfile) -> Result<(), IdentityError>;
            async fn commit(&mut self) -> Result<(), IdentityError>;
            async fn rollback(&mut self) -> Result<(), IdentityError>;
        }
    }

    mock! {
        pub TestNotifier {}

        #[async_trait]
        impl Notifier for TestNotifier {
            async fn send_password_reset(&self, to: &EmailAddress, reset_link: &str) -> Result<(), NotifierError>;
        }
    }

    fn test_tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(TokenServiceConfig::with_default_lifetimes(
            "test_access_secret_at_least_32_bytes!",
            "test_refresh_secret_at_least_32_bytes",
            "test_reset_secret_at_least_32_bytes!!",
        )))
    }

    fn test_hasher() -> Arc<PasswordHasher> {
        Arc::new(
            PasswordHasher::with_cost(HashCost {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        )
    }

    fn test_service(
        repository: MockTestIdentityRepository,
        notifier: MockTestNotifier,
        tokens: Arc<TokenService>,
    ) -> IdentityService<MockTestIdentityRepository, MockTestNotifier> {
        IdentityService::new(
            Arc::new(repository),
            Arc::new(notifier),
            test_hasher(),
            tokens,
            Url::parse("https://mentorspath.in/reset").unwrap(),
        )
    }

    fn email(value: &str) -> EmailAddress {
        EmailAddress::new(value.to_string()).unwrap()
    }

    fn existing_account(password: &str) -> Account {
        let hash = test_hasher().hash(password).unwrap();
        Account::new(
            email("ada@example.com"),
            hash,
            Role::Mentor,
            Some(ProfileId::new()),
            Utc::now(),
        )
    }

    fn register_command(password: &str, registration: RoleRegistration) -> RegisterCommand {
        RegisterCommand::new(
            email("ada@example.com"),
            password.to_string(),
            registration,
            ProfileFields::new("Ada", "Lovelace"),
        )
    }

    fn boxed(unit: MockTestUnitOfWork) -> Result<Box<dyn UnitOfWork>, IdentityError> {
        Ok(Box::new(unit))
    }

    #[tokio::test]
    async fn test_register_mentor_success() {
        let mut repository = MockTestIdentityRepository::new();
        let mut unit = MockTestUnitOfWork::new();
        let tokens = test_tokens();

        repository
            .expect_email_exists()
            .withf(|email| email.as_str() == "ada@example.com")
            .times(1)
            .returning(|_| Ok(false));

        unit.expect_create_profile()
            .withf(|profile| {
                profile.first_name == "Ada" && profile.avatar_url.contains("name=Ada+Lovelace")
            })
            .times(1)
            .returning(|_| Ok(()));
        unit.expect_create_account()
            .withf(|account| {
                account.role == Role::Mentor
                    && account.is_active
                    && account.password_hash.starts_with("$argon2id$")
            })
            .times(1)
            .returning(|_| Ok(()));
        unit.expect_create_role_profile()
            .withf(|role_profile| matches!(role_profile, RoleProfile::Mentor(_)))
            .times(1)
            .returning(|_| Ok(()));
        unit.expect_commit().times(1).returning(|| Ok(()));
        unit.expect_rollback().times(0);

        repository
            .expect_begin()
            .times(1)
            .return_once(move || boxed(unit));

        let service = test_service(repository, MockTestNotifier::new(), Arc::clone(&tokens));

        let session = service
            .register(register_command(
                "password123",
                RoleRegistration::Mentor(MentorFields::default()),
            ))
            .await
            .unwrap();

        assert_eq!(session.account.email.as_str(), "ada@example.com");
        assert_eq!(session.account.role, Role::Mentor);
        assert!(session.account.profile_id.is_some());
        assert_eq!(session.expires_in, 15 * 60);

        let access = tokens
            .verify(TokenPurpose::Access, &session.access_token, Utc::now())
            .unwrap();
        assert_eq!(access.sub, session.account.id.to_string());
        assert_eq!(access.role.as_deref(), Some("mentor"));
        assert!(tokens
            .verify(TokenPurpose::Refresh, &session.refresh_token, Utc::now())
            .is_ok());
    }

    #[tokio::test]
    async fn test_register_profile_links_match() {
        let mut repository = MockTestIdentityRepository::new();
        let mut unit = MockTestUnitOfWork::new();

        repository.expect_email_exists().returning(|_| Ok(false));

        let staged_profile = Arc::new(std::sync::Mutex::new(None));
        let staged_account = Arc::new(std::sync::Mutex::new(None));

        let profile_slot = Arc::clone(&staged_profile);
        unit.expect_create_profile().times(1).returning(move |profile| {
            *profile_slot.lock().unwrap() = Some(profile.id);
            Ok(())
        });
        let account_slot = Arc::clone(&staged_account);
        unit.expect_create_account().times(1).returning(move |account| {
            *account_slot.lock().unwrap() = Some((account.id, account.profile_id));
            Ok(())
        });

        let expected_profile = Arc::clone(&staged_profile);
        let expected_account = Arc::clone(&staged_account);
        unit.expect_create_role_profile()
            .times(1)
            .returning(move |role_profile| {
                let profile_id = expected_profile.lock().unwrap().unwrap();
                let (account_id, linked_profile) = expected_account.lock().unwrap().unwrap();
                assert_eq!(linked_profile, Some(profile_id));
                match role_profile {
                    RoleProfile::Mentee(mentee) => {
                        assert_eq!(mentee.account_id, account_id);
                        assert_eq!(mentee.profile_id, profile_id);
                    }
                    RoleProfile::Mentor(_) => panic!("expected mentee profile"),
                }
                Ok(())
            });
        unit.expect_commit().times(1).returning(|| Ok(()));

        repository.expect_begin().return_once(move || boxed(unit));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .register(register_command(
                "password123",
                RoleRegistration::Mentee(MenteeFields::default()),
            ))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_register_admin_has_no_role_profile() {
        let mut repository = MockTestIdentityRepository::new();
        let mut unit = MockTestUnitOfWork::new();

        repository.expect_email_exists().returning(|_| Ok(false));
        unit.expect_create_profile().times(1).returning(|_| Ok(()));
        unit.expect_create_account().times(1).returning(|_| Ok(()));
        unit.expect_create_role_profile().times(0);
        unit.expect_commit().times(1).returning(|| Ok(()));
        repository.expect_begin().return_once(move || boxed(unit));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let session = service
            .register(register_command("password123", RoleRegistration::Admin))
            .await
            .unwrap();

        assert_eq!(session.account.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_register_email_taken() {
        let mut repository = MockTestIdentityRepository::new();

        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(true));
        repository.expect_begin().times(0);

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .register(register_command(
                "password123",
                RoleRegistration::Mentee(MenteeFields::default()),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_register_weak_password_persists_nothing() {
        let mut repository = MockTestIdentityRepository::new();

        repository.expect_email_exists().returning(|_| Ok(false));
        repository.expect_begin().times(0);

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .register(register_command(
                "passwor",
                RoleRegistration::Mentee(MenteeFields::default()),
            ))
            .await;

        assert!(matches!(
            result,
            Err(IdentityError::WeakCredential { min: 8, actual: 7 })
        ));
    }

    #[tokio::test]
    async fn test_register_rolls_back_on_partial_failure() {
        let mut repository = MockTestIdentityRepository::new();
        let mut unit = MockTestUnitOfWork::new();

        repository.expect_email_exists().returning(|_| Ok(false));
        unit.expect_create_profile().times(1).returning(|_| Ok(()));
        unit.expect_create_account().times(1).returning(|_| Ok(()));
        unit.expect_create_role_profile()
            .times(1)
            .returning(|_| Err(IdentityError::Storage("insert failed".to_string())));
        unit.expect_commit().times(0);
        unit.expect_rollback().times(1).returning(|| Ok(()));
        repository.expect_begin().return_once(move || boxed(unit));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .register(register_command(
                "password123",
                RoleRegistration::Mentor(MentorFields::default()),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::Storage(_))));
    }

    #[tokio::test]
    async fn test_register_unique_violation_surfaces_as_email_taken() {
        let mut repository = MockTestIdentityRepository::new();
        let mut unit = MockTestUnitOfWork::new();

        repository.expect_email_exists().returning(|_| Ok(false));
        unit.expect_create_profile().returning(|_| Ok(()));
        unit.expect_create_account()
            .returning(|account| Err(IdentityError::EmailTaken(account.email.to_string())));
        unit.expect_commit().times(0);
        unit.expect_rollback().times(1).returning(|| Ok(()));
        repository.expect_begin().return_once(move || boxed(unit));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .register(register_command(
                "password123",
                RoleRegistration::Mentee(MenteeFields::default()),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let account = existing_account("password123");
        let account_id = account.id;

        let returned = account.clone();
        repository
            .expect_find_by_email()
            .withf(|email| email.as_str() == "ada@example.com")
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        repository
            .expect_update_login_time()
            .withf(move |id, _| *id == account_id)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = test_service(repository, MockTestNotifier::new(), Arc::clone(&tokens));
        let session = service
            .login(LoginCommand::new(
                email("ada@example.com"),
                "password123".to_string(),
            ))
            .await
            .unwrap();

        assert!(session.account.last_login_at.is_some());
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());

        let now = Utc::now();
        let access = tokens
            .verify(TokenPurpose::Access, &session.access_token, now)
            .unwrap();
        assert_eq!(access.sub, account_id.to_string());
        assert_eq!(access.email.as_deref(), Some("ada@example.com"));

        let refresh = tokens
            .verify(TokenPurpose::Refresh, &session.refresh_token, now)
            .unwrap();
        assert!(refresh.email.is_none());
        assert!(tokens
            .verify(TokenPurpose::Access, &session.refresh_token, now)
            .is_err());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut repository = MockTestIdentityRepository::new();
        let account = existing_account("password123");

        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));
        repository.expect_update_login_time().times(0);

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .login(LoginCommand::new(
                email("ada@example.com"),
                "password123x".to_string(),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut repository = MockTestIdentityRepository::new();

        repository.expect_find_by_email().returning(|_| Ok(None));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .login(LoginCommand::new(
                email("nobody@example.com"),
                "password123".to_string(),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_runs_verification() {
        let mut repository = MockTestIdentityRepository::new();

        repository.expect_find_by_email().returning(|_| Ok(None));
        repository.expect_update_login_time().times(0);

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        assert!(service.dummy_hash.get().is_none());

        for password in ["password123", "short"] {
            let result = service
                .login(LoginCommand::new(
                    email("nobody@example.com"),
                    password.to_string(),
                ))
                .await;
            assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
        }

        // Prepared once, a real Argon2 hash that matches no user input
        let hash = service.dummy_hash.get().unwrap().clone();
        assert!(hash.starts_with("$argon2id$"));
        assert!(test_hasher().verify(&hash, "password123").is_err());
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let mut repository = MockTestIdentityRepository::new();
        let mut account = existing_account("password123");
        account.is_active = false;

        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));
        repository.expect_update_login_time().times(0);

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .login(LoginCommand::new(
                email("ada@example.com"),
                "password123".to_string(),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::AccountInactive)));
    }

    #[tokio::test]
    async fn test_login_surfaces_timestamp_failure() {
        let mut repository = MockTestIdentityRepository::new();
        let account = existing_account("password123");

        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));
        repository
            .expect_update_login_time()
            .returning(|_, _| Err(IdentityError::Storage("connection reset".to_string())));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service
            .login(LoginCommand::new(
                email("ada@example.com"),
                "password123".to_string(),
            ))
            .await;

        assert!(matches!(result, Err(IdentityError::Storage(_))));
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let account = existing_account("password123");
        let account_id = account.id;

        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(account_id),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .with(eq(account_id))
            .times(1)
            .returning(move |_| Ok(Some(account.clone())));

        let service = test_service(repository, MockTestNotifier::new(), Arc::clone(&tokens));
        let session = service.refresh(&refresh_token).await.unwrap();

        let access = tokens
            .verify(TokenPurpose::Access, &session.access_token, Utc::now())
            .unwrap();
        assert_eq!(access.sub, account_id.to_string());
        assert!(tokens
            .verify(TokenPurpose::Refresh, &session.refresh_token, Utc::now())
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_tampered_token() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(AccountId::new()),
                Utc::now(),
            )
            .unwrap();

        repository.expect_find_by_id().times(0);

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&format!("{}x", refresh_token)).await;

        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_token() {
        let repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(AccountId::new()),
                Utc::now() - Duration::days(8),
            )
            .unwrap();

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&refresh_token).await;

        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let access_token = tokens
            .issue(
                TokenPurpose::Access,
                IssueClaims::for_subject(AccountId::new()),
                Utc::now(),
            )
            .unwrap();

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&access_token).await;

        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_token_from_before_password_reset() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let mut account = existing_account("password123");
        account.token_version = 1;

        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(account.id).with_version(0),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&refresh_token).await;

        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_unknown_account() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(AccountId::new()),
                Utc::now(),
            )
            .unwrap();

        repository.expect_find_by_id().returning(|_| Ok(None));

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&refresh_token).await;

        assert!(matches!(result, Err(IdentityError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_inactive_account() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let mut account = existing_account("password123");
        account.is_active = false;

        let refresh_token = tokens
            .issue(
                TokenPurpose::Refresh,
                IssueClaims::for_subject(account.id),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.refresh(&refresh_token).await;

        assert!(matches!(result, Err(IdentityError::AccountInactive)));
    }

    #[tokio::test]
    async fn test_forgot_password_sends_reset_link() {
        let mut repository = MockTestIdentityRepository::new();
        let mut notifier = MockTestNotifier::new();
        let tokens = test_tokens();
        let account = existing_account("password123");
        let account_id = account.id;

        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));

        let sent_links = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sent_links);
        notifier
            .expect_send_password_reset()
            .withf(|to, _| to.as_str() == "ada@example.com")
            .times(1)
            .returning(move |_, link| {
                recorded.lock().unwrap().push(link.to_string());
                Ok(())
            });

        let service = test_service(repository, notifier, Arc::clone(&tokens));
        let token = service
            .forgot_password(&email("ada@example.com"))
            .await
            .unwrap();

        let claims = tokens
            .verify(TokenPurpose::Reset, &token, Utc::now())
            .unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert!(claims.role.is_none());

        let links = sent_links.lock().unwrap();
        assert_eq!(
            links.as_slice(),
            [format!("https://mentorspath.in/reset?token={}", token)]
        );
    }

    #[tokio::test]
    async fn test_forgot_password_swallows_notifier_failure() {
        let mut repository = MockTestIdentityRepository::new();
        let mut notifier = MockTestNotifier::new();
        let account = existing_account("password123");

        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(account.clone())));
        notifier
            .expect_send_password_reset()
            .times(1)
            .returning(|_, _| Err(NotifierError::DeliveryFailed("smtp down".to_string())));

        let service = test_service(repository, notifier, test_tokens());
        let result = service.forgot_password(&email("ada@example.com")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let mut repository = MockTestIdentityRepository::new();
        let mut notifier = MockTestNotifier::new();

        repository.expect_find_by_email().returning(|_| Ok(None));
        notifier.expect_send_password_reset().times(0);

        let service = test_service(repository, notifier, test_tokens());
        let result = service.forgot_password(&email("nobody@example.com")).await;

        assert!(matches!(result, Err(IdentityError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_password_success() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let mut account = existing_account("password123");
        account.token_version = 2;
        let account_id = account.id;

        let reset_token = tokens
            .issue(
                TokenPurpose::Reset,
                IssueClaims::for_subject(account_id).with_version(2),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));
        repository
            .expect_update_password_hash()
            .withf(move |id, hash, expected_version| {
                let hasher = test_hasher();
                *id == account_id
                    && *expected_version == 2
                    && hasher.verify(hash, "new_password1").is_ok()
                    && hasher.verify(hash, "password123").is_err()
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service
            .reset_password(&reset_token, "new_password1".to_string())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_expired_token() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();

        let reset_token = tokens
            .issue(
                TokenPurpose::Reset,
                IssueClaims::for_subject(AccountId::new()),
                Utc::now() - Duration::minutes(16),
            )
            .unwrap();

        repository.expect_update_password_hash().times(0);

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service
            .reset_password(&reset_token, "new_password1".to_string())
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_reset_password_rejects_used_token() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let mut account = existing_account("password123");
        account.token_version = 1;

        let reset_token = tokens
            .issue(
                TokenPurpose::Reset,
                IssueClaims::for_subject(account.id).with_version(0),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));
        repository.expect_update_password_hash().times(0);

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service
            .reset_password(&reset_token, "new_password1".to_string())
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_reset_password_loses_concurrent_race() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let account = existing_account("password123");

        let reset_token = tokens
            .issue(
                TokenPurpose::Reset,
                IssueClaims::for_subject(account.id),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));
        repository
            .expect_update_password_hash()
            .returning(|_, _, _| Ok(false));

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service
            .reset_password(&reset_token, "new_password1".to_string())
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_reset_password_weak_password() {
        let mut repository = MockTestIdentityRepository::new();
        let tokens = test_tokens();
        let account = existing_account("password123");

        let reset_token = tokens
            .issue(
                TokenPurpose::Reset,
                IssueClaims::for_subject(account.id),
                Utc::now(),
            )
            .unwrap();

        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(account.clone())));
        repository.expect_update_password_hash().times(0);

        let service = test_service(repository, MockTestNotifier::new(), tokens);
        let result = service.reset_password(&reset_token, "short".to_string()).await;

        assert!(matches!(
            result,
            Err(IdentityError::WeakCredential { actual: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_account_with_profiles() {
        let mut repository = MockTestIdentityRepository::new();
        let account = existing_account("password123");
        let account_id = account.id;
        let profile_id = account.profile_id.unwrap();

        let mut profile = Profile::new(ProfileFields::new("Ada", "Lovelace"), Utc::now());
        profile.id = profile_id;
        let role_profile = RoleRegistration::Mentor(MentorFields::default())
            .into_role_profile(account_id, profile_id, Utc::now())
            .unwrap();

        repository
            .expect_find_by_id()
            .with(eq(account_id))
            .returning(move |_| Ok(Some(account.clone())));
        repository
            .expect_find_profile()
            .with(eq(profile_id))
            .returning(move |_| Ok(Some(profile.clone())));
        repository
            .expect_find_role_profile()
            .with(eq(account_id))
            .returning(move |_| Ok(Some(role_profile.clone())));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let details = service.get_account(&account_id).await.unwrap();

        assert_eq!(details.account.id, account_id);
        assert_eq!(
            details.profile.map(|profile| profile.first_name),
            Some("Ada".to_string())
        );
        assert!(matches!(details.role_profile, Some(RoleProfile::Mentor(_))));
    }

    #[tokio::test]
    async fn test_get_account_not_found() {
        let mut repository = MockTestIdentityRepository::new();

        repository.expect_find_by_id().returning(|_| Ok(None));

        let service = test_service(repository, MockTestNotifier::new(), test_tokens());
        let result = service.get_account(&AccountId::new()).await;

        assert!(matches!(result, Err(IdentityError::AccountNotFound(_))));
    }
}

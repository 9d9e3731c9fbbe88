use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::identity::errors::IdentityError;
use crate::identity::models::Account;
use crate::identity::models::AccountId;
use crate::identity::models::EmailAddress;
use crate::identity::models::Profile;
use crate::identity::models::ProfileId;
use crate::identity::models::RoleProfile;
use crate::identity::ports::IdentityRepository;
use crate::identity::ports::UnitOfWork;

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<AccountId, Account>,
    profiles: HashMap<ProfileId, Profile>,
    role_profiles: HashMap<AccountId, RoleProfile>,
}

impl Store {
    fn holds_email(&self, email: &EmailAddress) -> bool {
        self.accounts.values().any(|account| &account.email == email)
    }
}

/// In-memory identity repository for development and tests.
///
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate or deactivate an account. Returns false if it does not exist.
    pub async fn set_active(&self, id: &AccountId, active: bool) -> bool {
        let mut store = self.store.write().await;

        match store.accounts.get_mut(id) {
            Some(account) => {
                account.is_active = active;
                account.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn account_count(&self) -> usize {
        self.store.read().await.accounts.len()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IdentityError> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: Arc::clone(&self.store),
            staged: Some(Staged::default()),
        }))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError> {
        let store = self.store.read().await;

        Ok(store
            .accounts
            .values()
            .find(|account| &account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError> {
        Ok(self.store.read().await.accounts.get(id).cloned())
    }

    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, IdentityError> {
        Ok(self.store.read().await.holds_email(email))
    }

    async fn update_login_time(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityError> {
        let mut store = self.store.write().await;
        let account = store
            .accounts
            .get_mut(id)
            .ok_or_else(|| IdentityError::AccountNotFound(id.to_string()))?;

        account.last_login_at = Some(at);
        account.updated_at = at;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        expected_version: i32,
    ) -> Result<bool, IdentityError> {
        let mut store = self.store.write().await;

        match store.accounts.get_mut(id) {
            Some(account) if account.token_version == expected_version => {
                account.password_hash = password_hash.to_string();
                account.token_version += 1;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, IdentityError> {
        Ok(self.store.read().await.profiles.get(id).cloned())
    }

    async fn find_role_profile(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<RoleProfile>, IdentityError> {
        Ok(self.store.read().await.role_profiles.get(account_id).cloned())
    }
}

#[derive(Debug, Default)]
struct Staged {
    profiles: Vec<Profile>,
    accounts: Vec<Account>,
    role_profiles: Vec<RoleProfile>,
}

/// Buffers writes and applies them under a single write lock on commit.
pub struct InMemoryUnitOfWork {
    store: Arc<RwLock<Store>>,
    staged: Option<Staged>,
}

impl InMemoryUnitOfWork {
    fn staged(&mut self) -> Result<&mut Staged, IdentityError> {
        self.staged
            .as_mut()
            .ok_or_else(|| IdentityError::Storage("Unit of work already finished".to_string()))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn create_profile(&mut self, profile: &Profile) -> Result<(), IdentityError> {
        self.staged()?.profiles.push(profile.clone());
        Ok(())
    }

    async fn create_account(&mut self, account: &Account) -> Result<(), IdentityError> {
        let staged = self.staged()?;
        if staged.accounts.iter().any(|a| a.email == account.email) {
            return Err(IdentityError::EmailTaken(account.email.to_string()));
        }

        staged.accounts.push(account.clone());
        Ok(())
    }

    async fn create_role_profile(
        &mut self,
        role_profile: &RoleProfile,
    ) -> Result<(), IdentityError> {
        self.staged()?.role_profiles.push(role_profile.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), IdentityError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| IdentityError::Storage("Unit of work already finished".to_string()))?;

        let mut store = self.store.write().await;

        // Uniqueness is decided here, under the write lock
        if let Some(taken) = staged
            .accounts
            .iter()
            .find(|account| store.holds_email(&account.email))
        {
            return Err(IdentityError::EmailTaken(taken.email.to_string()));
        }

        for profile in staged.profiles {
            store.profiles.insert(profile.id, profile);
        }
        for account in staged.accounts {
            store.accounts.insert(account.id, account);
        }
        for role_profile in staged.role_profiles {
            store.role_profiles.insert(role_profile.account_id(), role_profile);
        }

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), IdentityError> {
        self.staged = None;
        Ok(())
    }
}

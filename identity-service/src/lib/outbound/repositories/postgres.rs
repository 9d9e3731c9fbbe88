use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use sqlx::FromRow;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use uuid::Uuid;

use crate::identity::errors::IdentityError;
use crate::identity::models::Account;
use crate::identity::models::AccountId;
use crate::identity::models::EmailAddress;
use crate::identity::models::MenteeFields;
use crate::identity::models::MenteeProfile;
use crate::identity::models::MentorFields;
use crate::identity::models::MentorProfile;
use crate::identity::models::Profile;
use crate::identity::models::ProfileId;
use crate::identity::models::RoleProfile;
use crate::identity::ports::IdentityRepository;
use crate::identity::ports::UnitOfWork;

const ACCOUNTS_EMAIL_KEY: &str = "accounts_email_key";

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, is_verified, is_active, \
     last_login_at, profile_id, token_version, created_at, updated_at";

pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    is_verified: bool,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    profile_id: Option<Uuid>,
    token_version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = IdentityError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId(row.id),
            email: EmailAddress::new(row.email)?,
            password_hash: row.password_hash,
            role: row
                .role
                .parse()
                .map_err(|e| IdentityError::Storage(format!("Corrupt account row: {}", e)))?,
            is_verified: row.is_verified,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            profile_id: row.profile_id.map(ProfileId),
            token_version: row.token_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    avatar_url: String,
    image_url: String,
    bio: String,
    headline: String,
    website_url: String,
    linkedin_url: String,
    twitter: String,
    timezone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: ProfileId(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            image_url: row.image_url,
            bio: row.bio,
            headline: row.headline,
            website_url: row.website_url,
            linkedin_url: row.linkedin_url,
            twitter: row.twitter,
            timezone: row.timezone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MentorProfileRow {
    id: Uuid,
    account_id: Uuid,
    profile_id: Uuid,
    intro_video_url: String,
    podcast_url: String,
    verification_status: String,
    expertise_area: String,
    industry: String,
    years_of_experience: Option<i32>,
    calendly_link: String,
    hourly_rate: f64,
    is_accepting_new_mentees: bool,
    available_days: Option<Value>,
    available_time_slots: Option<Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MentorProfileRow> for MentorProfile {
    type Error = IdentityError;

    fn try_from(row: MentorProfileRow) -> Result<Self, Self::Error> {
        Ok(MentorProfile {
            id: row.id,
            account_id: AccountId(row.account_id),
            profile_id: ProfileId(row.profile_id),
            verification_status: row.verification_status.parse().map_err(|e| {
                IdentityError::Storage(format!("Corrupt mentor profile row: {}", e))
            })?,
            fields: MentorFields {
                intro_video_url: row.intro_video_url,
                podcast_url: row.podcast_url,
                expertise_area: row.expertise_area,
                industry: row.industry,
                years_of_experience: row.years_of_experience,
                calendly_link: row.calendly_link,
                hourly_rate: row.hourly_rate,
                is_accepting_new_mentees: row.is_accepting_new_mentees,
                available_days: row.available_days.unwrap_or_default(),
                available_time_slots: row.available_time_slots.unwrap_or_default(),
            },
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct MenteeProfileRow {
    id: Uuid,
    account_id: Uuid,
    profile_id: Uuid,
    current_role: String,
    current_company: String,
    learning_goals: Option<Value>,
    interests: Option<Value>,
    skill_level: String,
    created_at: DateTime<Utc>,
}

impl From<MenteeProfileRow> for MenteeProfile {
    fn from(row: MenteeProfileRow) -> Self {
        MenteeProfile {
            id: row.id,
            account_id: AccountId(row.account_id),
            profile_id: ProfileId(row.profile_id),
            fields: MenteeFields {
                current_role: row.current_role,
                current_company: row.current_company,
                learning_goals: row.learning_goals.unwrap_or_default(),
                interests: row.interests.unwrap_or_default(),
                skill_level: row.skill_level,
            },
            created_at: row.created_at,
        }
    }
}

/// JSON null is stored as SQL NULL.
fn json_column(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

fn storage_error(e: sqlx::Error) -> IdentityError {
    IdentityError::Storage(e.to_string())
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IdentityError> {
        let transaction = self.pool.begin().await.map_err(storage_error)?;

        Ok(Box::new(PostgresUnitOfWork {
            transaction: Some(transaction),
        }))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE email = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Account::try_from).transpose()
    }

    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, IdentityError> {
        // Soft-deleted rows still hold the unique email
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
            .bind(email.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn update_login_time(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET last_login_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::AccountNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        expected_version: i32,
    ) -> Result<bool, IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1 AND token_version = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(id.0)
        .bind(password_hash)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, IdentityError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, first_name, last_name, avatar_url, image_url, bio, headline,
                   website_url, linkedin_url, twitter, timezone, created_at, updated_at
            FROM profiles
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(Profile::from))
    }

    async fn find_role_profile(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<RoleProfile>, IdentityError> {
        let mentor = sqlx::query_as::<_, MentorProfileRow>(
            r#"
            SELECT id, account_id, profile_id, intro_video_url, podcast_url, verification_status,
                   expertise_area, industry, years_of_experience, calendly_link, hourly_rate,
                   is_accepting_new_mentees, available_days, available_time_slots, created_at
            FROM mentor_profiles
            WHERE account_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if let Some(row) = mentor {
            return Ok(Some(RoleProfile::Mentor(MentorProfile::try_from(row)?)));
        }

        let mentee = sqlx::query_as::<_, MenteeProfileRow>(
            r#"
            SELECT id, account_id, profile_id, "current_role", current_company, learning_goals,
                   interests, skill_level, created_at
            FROM mentee_profiles
            WHERE account_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(mentee.map(|row| RoleProfile::Mentee(MenteeProfile::from(row))))
    }
}

/// Unit of work backed by a single Postgres transaction.
///
/// Dropping it before `commit` rolls the transaction back.
pub struct PostgresUnitOfWork {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl PostgresUnitOfWork {
    fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, IdentityError> {
        self.transaction
            .as_mut()
            .ok_or_else(|| IdentityError::Storage("Unit of work already finished".to_string()))
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn create_profile(&mut self, profile: &Profile) -> Result<(), IdentityError> {
        let transaction = self.transaction()?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, first_name, last_name, avatar_url, image_url, bio, headline,
                                  website_url, linkedin_url, twitter, timezone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(profile.id.0)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(&profile.image_url)
        .bind(&profile.bio)
        .bind(&profile.headline)
        .bind(&profile.website_url)
        .bind(&profile.linkedin_url)
        .bind(&profile.twitter)
        .bind(&profile.timezone)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut **transaction)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn create_account(&mut self, account: &Account) -> Result<(), IdentityError> {
        let transaction = self.transaction()?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, password_hash, role, is_verified, is_active,
                                  last_login_at, profile_id, token_version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id.0)
        .bind(account.email.as_str())
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.is_verified)
        .bind(account.is_active)
        .bind(account.last_login_at)
        .bind(account.profile_id.map(|id| id.0))
        .bind(account.token_version)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut **transaction)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some(ACCOUNTS_EMAIL_KEY)
                {
                    return IdentityError::EmailTaken(account.email.to_string());
                }
            }
            storage_error(e)
        })?;

        Ok(())
    }

    async fn create_role_profile(
        &mut self,
        role_profile: &RoleProfile,
    ) -> Result<(), IdentityError> {
        let transaction = self.transaction()?;

        match role_profile {
            RoleProfile::Mentor(mentor) => {
                sqlx::query(
                    r#"
                    INSERT INTO mentor_profiles (id, account_id, profile_id, intro_video_url,
                        podcast_url, verification_status, expertise_area, industry,
                        years_of_experience, calendly_link, hourly_rate, is_accepting_new_mentees,
                        available_days, available_time_slots, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
                    "#,
                )
                .bind(mentor.id)
                .bind(mentor.account_id.0)
                .bind(mentor.profile_id.0)
                .bind(&mentor.fields.intro_video_url)
                .bind(&mentor.fields.podcast_url)
                .bind(mentor.verification_status.as_str())
                .bind(&mentor.fields.expertise_area)
                .bind(&mentor.fields.industry)
                .bind(mentor.fields.years_of_experience)
                .bind(&mentor.fields.calendly_link)
                .bind(mentor.fields.hourly_rate)
                .bind(mentor.fields.is_accepting_new_mentees)
                .bind(json_column(&mentor.fields.available_days))
                .bind(json_column(&mentor.fields.available_time_slots))
                .bind(mentor.created_at)
                .execute(&mut **transaction)
                .await
                .map_err(storage_error)?;
            }
            RoleProfile::Mentee(mentee) => {
                sqlx::query(
                    r#"
                    INSERT INTO mentee_profiles (id, account_id, profile_id, "current_role",
                        current_company, learning_goals, interests, skill_level,
                        created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                    "#,
                )
                .bind(mentee.id)
                .bind(mentee.account_id.0)
                .bind(mentee.profile_id.0)
                .bind(&mentee.fields.current_role)
                .bind(&mentee.fields.current_company)
                .bind(json_column(&mentee.fields.learning_goals))
                .bind(json_column(&mentee.fields.interests))
                .bind(&mentee.fields.skill_level)
                .bind(mentee.created_at)
                .execute(&mut **transaction)
                .await
                .map_err(storage_error)?;
            }
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), IdentityError> {
        let transaction = self
            .transaction
            .take()
            .ok_or_else(|| IdentityError::Storage("Unit of work already finished".to_string()))?;

        transaction.commit().await.map_err(storage_error)
    }

    async fn rollback(&mut self) -> Result<(), IdentityError> {
        match self.transaction.take() {
            Some(transaction) => transaction.rollback().await.map_err(storage_error),
            None => Ok(()),
        }
    }
}

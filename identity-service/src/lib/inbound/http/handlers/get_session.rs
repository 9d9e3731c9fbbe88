use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::AccountData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::identity::models::AccountDetails;
use crate::domain::identity::models::Profile;
use crate::domain::identity::models::RoleProfile;
use crate::domain::identity::ports::IdentityServicePort;
use crate::inbound::http::middleware::AuthenticatedAccount;
use crate::inbound::http::router::AppState;

/// Current account with its profile records.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(authenticated): Extension<AuthenticatedAccount>,
) -> Result<ApiSuccess<SessionAccountData>, ApiError> {
    state
        .identity_service
        .get_account(&authenticated.account_id)
        .await
        .map_err(ApiError::from)
        .map(|ref details| ApiSuccess::new(StatusCode::OK, details.into()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAccountData {
    pub account: AccountData,
    pub profile: Option<ProfileData>,
    pub role_profile: Option<RoleProfileData>,
}

impl From<&AccountDetails> for SessionAccountData {
    fn from(details: &AccountDetails) -> Self {
        Self {
            account: (&details.account).into(),
            profile: details.profile.as_ref().map(ProfileData::from),
            role_profile: details.role_profile.as_ref().map(RoleProfileData::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileData {
    pub id: String,
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

impl From<&Profile> for ProfileData {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.to_string(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            image_url: profile.image_url.clone(),
            bio: profile.bio.clone(),
            headline: profile.headline.clone(),
            website_url: profile.website_url.clone(),
            linkedin_url: profile.linkedin_url.clone(),
            twitter: profile.twitter.clone(),
            timezone: profile.timezone.clone(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleProfileData {
    Mentor {
        id: String,
        verification_status: String,
        intro_video_url: String,
        podcast_url: String,
        expertise_area: String,
        industry: String,
        years_of_experience: Option<i32>,
        calendly_link: String,
        hourly_rate: f64,
        is_accepting_new_mentees: bool,
        available_days: Value,
        available_time_slots: Value,
    },
    Mentee {
        id: String,
        current_role: String,
        current_company: String,
        learning_goals: Value,
        interests: Value,
        skill_level: String,
    },
}

impl From<&RoleProfile> for RoleProfileData {
    fn from(role_profile: &RoleProfile) -> Self {
        match role_profile {
            RoleProfile::Mentor(mentor) => RoleProfileData::Mentor {
                id: mentor.id.to_string(),
                verification_status: mentor.verification_status.as_str().to_string(),
                intro_video_url: mentor.fields.intro_video_url.clone(),
                podcast_url: mentor.fields.podcast_url.clone(),
                expertise_area: mentor.fields.expertise_area.clone(),
                industry: mentor.fields.industry.clone(),
                years_of_experience: mentor.fields.years_of_experience,
                calendly_link: mentor.fields.calendly_link.clone(),
                hourly_rate: mentor.fields.hourly_rate,
                is_accepting_new_mentees: mentor.fields.is_accepting_new_mentees,
                available_days: mentor.fields.available_days.clone(),
                available_time_slots: mentor.fields.available_time_slots.clone(),
            },
            RoleProfile::Mentee(mentee) => RoleProfileData::Mentee {
                id: mentee.id.to_string(),
                current_role: mentee.fields.current_role.clone(),
                current_company: mentee.fields.current_company.clone(),
                learning_goals: mentee.fields.learning_goals.clone(),
                interests: mentee.fields.interests.clone(),
                skill_level: mentee.fields.skill_level.clone(),
            },
        }
    }
}

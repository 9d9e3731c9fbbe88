use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::SessionResponseData;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::MenteeFields;
use crate::domain::identity::models::MentorFields;
use crate::domain::identity::models::ProfileFields;
use crate::domain::identity::models::RegisterCommand;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::RoleRegistration;
use crate::domain::identity::ports::IdentityServicePort;
use crate::identity::errors::EmailError;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<ApiSuccess<SessionResponseData>, ApiError> {
    state
        .identity_service
        .register(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref session| ApiSuccess::new(StatusCode::CREATED, session.into()))
}

/// HTTP request body for signing up (raw JSON)
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    role: String,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    website_url: String,
    #[serde(default)]
    linkedin_url: String,
    #[serde(default)]
    twitter: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    mentor_profile: Option<MentorProfileRequest>,
    #[serde(default)]
    mentee_profile: Option<MenteeProfileRequest>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .field("mentor_profile", &self.mentor_profile)
            .field("mentee_profile", &self.mentee_profile)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MentorProfileRequest {
    intro_video_url: String,
    podcast_url: String,
    expertise_area: String,
    industry: String,
    years_of_experience: Option<i32>,
    calendly_link: String,
    hourly_rate: f64,
    is_accepting_new_mentees: Option<bool>,
    available_days: Value,
    available_time_slots: Value,
}

impl From<MentorProfileRequest> for MentorFields {
    fn from(request: MentorProfileRequest) -> Self {
        MentorFields {
            intro_video_url: request.intro_video_url,
            podcast_url: request.podcast_url,
            expertise_area: request.expertise_area,
            industry: request.industry,
            years_of_experience: request.years_of_experience,
            calendly_link: request.calendly_link,
            hourly_rate: request.hourly_rate,
            is_accepting_new_mentees: request.is_accepting_new_mentees.unwrap_or(true),
            available_days: request.available_days,
            available_time_slots: request.available_time_slots,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MenteeProfileRequest {
    current_role: String,
    current_company: String,
    learning_goals: Value,
    interests: Value,
    skill_level: String,
}

impl From<MenteeProfileRequest> for MenteeFields {
    fn from(request: MenteeProfileRequest) -> Self {
        MenteeFields {
            current_role: request.current_role,
            current_company: request.current_company,
            learning_goals: request.learning_goals,
            interests: request.interests,
            skill_level: request.skill_level,
        }
    }
}

#[derive(Debug, Clone, Error)]
enum ParseRegisterRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Role must be mentor or mentee, got {0}")]
    UnsupportedRole(String),

    #[error("{0} profile data does not match role {1}")]
    RoleMismatch(&'static str, Role),
}

impl RegisterRequest {
    fn try_into_command(self) -> Result<RegisterCommand, ParseRegisterRequestError> {
        let email = EmailAddress::new(self.email)?;

        if self.first_name.trim().is_empty() {
            return Err(ParseRegisterRequestError::MissingField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ParseRegisterRequestError::MissingField("last_name"));
        }

        // Admin accounts are never created through public signup
        let registration = match self.role.parse::<Role>() {
            Ok(Role::Mentor) => {
                if self.mentee_profile.is_some() {
                    return Err(ParseRegisterRequestError::RoleMismatch("Mentee", Role::Mentor));
                }
                RoleRegistration::Mentor(self.mentor_profile.unwrap_or_default().into())
            }
            Ok(Role::Mentee) => {
                if self.mentor_profile.is_some() {
                    return Err(ParseRegisterRequestError::RoleMismatch("Mentor", Role::Mentee));
                }
                RoleRegistration::Mentee(self.mentee_profile.unwrap_or_default().into())
            }
            Ok(Role::Admin) | Err(_) => {
                return Err(ParseRegisterRequestError::UnsupportedRole(self.role))
            }
        };

        let profile = ProfileFields {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            avatar_url: self.avatar_url,
            image_url: self.image_url,
            bio: self.bio,
            headline: self.headline,
            website_url: self.website_url,
            linkedin_url: self.linkedin_url,
            twitter: self.twitter,
            timezone: self.timezone,
        };

        Ok(RegisterCommand::new(
            email,
            self.password,
            registration,
            profile,
        ))
    }
}

impl From<ParseRegisterRequestError> for ApiError {
    fn from(err: ParseRegisterRequestError) -> Self {
        match err {
            ParseRegisterRequestError::UnsupportedRole(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::UnprocessableEntity(err.to_string()),
        }
    }
}

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::identity::errors::IdentityError;
use crate::identity::models::Account;
use crate::identity::models::Session;

pub mod forgot_password;
pub mod get_session;
pub mod login;
pub mod refresh;
pub mod register;
pub mod reset_password;

const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    UnprocessableEntity(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        (status, Json(ApiResponseBody::new_error(status, message))).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidEmail(_)
            | IdentityError::InvalidAccountId(_)
            | IdentityError::InvalidRegistration(_)
            | IdentityError::WeakCredential { .. } => ApiError::UnprocessableEntity(err.to_string()),
            IdentityError::EmailTaken(_) => ApiError::Conflict("Email already registered".to_string()),
            IdentityError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            IdentityError::InvalidToken | IdentityError::InvalidOrExpiredToken => {
                ApiError::Unauthorized(err.to_string())
            }
            IdentityError::AccountInactive => ApiError::Forbidden(err.to_string()),
            IdentityError::AccountNotFound(_) => {
                ApiError::NotFound("Account not found".to_string())
            }
            IdentityError::Storage(_)
            | IdentityError::Credential(_)
            | IdentityError::TokenIssuance(_)
            | IdentityError::Unknown(_) => {
                tracing::error!(error = %err, "Request failed");
                ApiError::InternalServerError("Internal server error".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of an account. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountData {
    pub id: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountData {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.as_str().to_string(),
            role: account.role.as_str().to_string(),
            is_verified: account.is_verified,
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            profile_id: account.profile_id.map(|id| id.to_string()),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResponseData {
    pub account: AccountData,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl From<&Session> for SessionResponseData {
    fn from(session: &Session) -> Self {
        Self {
            account: (&session.account).into(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            token_type: TOKEN_TYPE.to_string(),
            expires_in: session.expires_in,
        }
    }
}

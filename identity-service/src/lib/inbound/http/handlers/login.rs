use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::SessionResponseData;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::LoginCommand;
use crate::domain::identity::ports::IdentityServicePort;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiSuccess<SessionResponseData>, ApiError> {
    // A malformed email can never match an account
    let email = EmailAddress::new(body.email)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    state
        .identity_service
        .login(LoginCommand::new(email, body.password))
        .await
        .map_err(ApiError::from)
        .map(|ref session| ApiSuccess::new(StatusCode::OK, session.into()))
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

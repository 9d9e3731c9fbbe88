use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::identity::ports::IdentityServicePort;
use crate::inbound::http::router::AppState;

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .identity_service
        .reset_password(&body.token, body.new_password)
        .await
        .map_err(ApiError::from)
        .map(|_| {
            ApiSuccess::new(
                StatusCode::OK,
                MessageData::new("Password has been reset"),
            )
        })
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

impl fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("token", &"[redacted]")
            .field("new_password", &"[redacted]")
            .finish()
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::ports::IdentityServicePort;
use crate::identity::errors::IdentityError;
use crate::inbound::http::router::AppState;

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent";

/// Answers a well-formed request the same way whether or not the account
/// exists. The token only travels by email. Server failures still surface.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    let email = EmailAddress::new(body.email)
        .map_err(|e| ApiError::UnprocessableEntity(IdentityError::from(e).to_string()))?;

    // Only the unknown-account outcome is folded into the uniform answer
    match state.identity_service.forgot_password(&email).await {
        Ok(_) => {}
        Err(IdentityError::AccountNotFound(_)) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => return Err(ApiError::from(e)),
    }

    Ok(ApiSuccess::new(
        StatusCode::OK,
        MessageData::new(FORGOT_PASSWORD_MESSAGE),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}

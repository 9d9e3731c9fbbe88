use axum::extract::Request;
use axum::extract::State;
use axum::http;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use chrono::Utc;

use super::handlers::ApiError;
use crate::domain::identity::models::AccountId;
use crate::domain::identity::models::Role;
use crate::inbound::http::router::AppState;
use auth::TokenPurpose;

/// Identity carried by a verified access token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account_id: AccountId,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Middleware that validates access tokens and adds the account to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    // Refresh and reset tokens are signed with other keys and carry another purpose
    let claims = state
        .tokens
        .verify(TokenPurpose::Access, token, Utc::now())
        .map_err(|e| {
            tracing::warn!(error = %e, "Access token rejected");
            unauthorized("Invalid or expired token")
        })?;

    let account_id = AccountId::from_string(&claims.sub).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse account ID from token");
        unauthorized("Invalid token format")
    })?;

    let role = claims.role.as_deref().and_then(|role| role.parse().ok());

    req.extensions_mut().insert(AuthenticatedAccount {
        account_id,
        email: claims.email,
        role,
    });

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    auth_str
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            unauthorized("Invalid Authorization header format. Expected: Bearer <token>")
        })
}

fn unauthorized(message: &str) -> Response {
    ApiError::Unauthorized(message.to_string()).into_response()
}

use std::sync::Arc;
use std::time::Duration;

use auth::TokenService;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::forgot_password::forgot_password;
use super::handlers::get_session::get_session;
use super::handlers::login::login;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::reset_password::reset_password;
use super::middleware::authenticate as auth_middleware;
use crate::domain::identity::ports::IdentityServicePort;

#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<dyn IdentityServicePort>,
    pub tokens: Arc<TokenService>,
}

pub fn create_router(
    identity_service: Arc<dyn IdentityServicePort>,
    tokens: Arc<TokenService>,
    request_timeout: Duration,
) -> Router {
    let state = AppState {
        identity_service,
        tokens,
    };

    let public_routes = Router::new()
        .route("/auth/signup", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password));

    let protected_routes = Router::new()
        .route("/api/session", get(get_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Headers stay out of the span, they carry bearer tokens
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

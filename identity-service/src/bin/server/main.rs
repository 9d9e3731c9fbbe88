use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth::PasswordHasher;
use auth::TokenService;
use identity_service::config::Config;
use identity_service::config::NotifierTransport;
use identity_service::domain::identity::ports::IdentityServicePort;
use identity_service::domain::identity::ports::Notifier;
use identity_service::domain::identity::service::IdentityService;
use identity_service::inbound::http::router::create_router;
use identity_service::notifiers::LogNotifier;
use identity_service::notifiers::SmtpNotifier;
use identity_service::repositories::PostgresIdentityRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        notifier = ?config.notifier.transport,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let token_config = config.jwt.token_service_config();
    if token_config.shares_secrets() {
        tracing::warn!("Token purposes share a signing secret, configure distinct keys");
    }
    let tokens = Arc::new(TokenService::new(token_config));
    let password_hasher = Arc::new(PasswordHasher::with_cost(config.password.hash_cost())?);
    let reset_url = Url::parse(&config.notifier.reset_url)
        .with_context(|| format!("Invalid reset_url {}", config.notifier.reset_url))?;
    let repository = Arc::new(PostgresIdentityRepository::new(pg_pool));

    let identity_service: Arc<dyn IdentityServicePort> = match config.notifier.transport {
        NotifierTransport::Log => {
            tracing::warn!("Log notifier active, reset links are written to the log");
            build_service(
                repository,
                LogNotifier::new(),
                password_hasher,
                Arc::clone(&tokens),
                reset_url,
            )
        }
        NotifierTransport::Smtp => {
            let smtp = config
                .notifier
                .smtp
                .as_ref()
                .context("notifier.transport is smtp but [notifier.smtp] is missing")?;
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP notifier configured");
            build_service(
                repository,
                SmtpNotifier::new(smtp.smtp_settings())?,
                password_hasher,
                Arc::clone(&tokens),
                reset_url,
            )
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(
        identity_service,
        tokens,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    axum::serve(http_listener, http_application).await?;
    tracing::info!("Server exited");

    Ok(())
}

fn build_service<N: Notifier>(
    repository: Arc<PostgresIdentityRepository>,
    notifier: N,
    password_hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
    reset_url: Url,
) -> Arc<dyn IdentityServicePort> {
    Arc::new(IdentityService::new(
        repository,
        Arc::new(notifier),
        password_hasher,
        tokens,
        reset_url,
    ))
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::HashCost;
use auth::PasswordHasher;
use auth::TokenService;
use auth::TokenServiceConfig;
use identity_service::domain::identity::service::IdentityService;
use identity_service::identity::errors::NotifierError;
use identity_service::identity::models::EmailAddress;
use identity_service::identity::ports::Notifier;
use identity_service::inbound::http::router::create_router;
use identity_service::repositories::InMemoryIdentityRepository;
use serde_json::json;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const RESET_URL: &str = "https://mentorspath.in/reset-password";

/// Captures password reset messages instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Token from the most recent reset link sent to `email`.
    pub async fn last_reset_token(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().await;
        let (_, link) = sent.iter().rev().find(|(to, _)| to == email)?;

        Url::parse(link)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        reset_link: &str,
    ) -> Result<(), NotifierError> {
        self.sent
            .lock()
            .await
            .push((to.as_str().to_string(), reset_link.to_string()));
        Ok(())
    }
}

/// Test application that spawns a real server over the in-memory repository
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub repository: InMemoryIdentityRepository,
    pub notifier: RecordingNotifier,
    pub tokens: Arc<TokenService>,
    pub api_client: reqwest::Client,
}

pub fn test_tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new(TokenServiceConfig::with_default_lifetimes(
        "test_access_secret_at_least_32_bytes!",
        "test_refresh_secret_at_least_32_bytes",
        "test_reset_secret_at_least_32_bytes!!",
    )))
}

pub fn test_hasher() -> Arc<PasswordHasher> {
    Arc::new(
        PasswordHasher::with_cost(HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("Failed to create password hasher"),
    )
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let repository = InMemoryIdentityRepository::new();
        let notifier = RecordingNotifier::default();
        let tokens = test_tokens();

        let identity_service = Arc::new(IdentityService::new(
            Arc::new(repository.clone()),
            Arc::new(notifier.clone()),
            test_hasher(),
            Arc::clone(&tokens),
            Url::parse(RESET_URL).unwrap(),
        ));

        let router = create_router(identity_service, Arc::clone(&tokens), Duration::from_secs(10));

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            port,
            repository,
            notifier,
            tokens,
            api_client: reqwest::Client::new(),
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Sign up a mentee and return the response body
    pub async fn signup(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/signup")
            .json(&json!({
                "email": email,
                "password": password,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "role": "mentee"
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Sign up and return the session payload under `data`
    pub async fn signup_session(&self, email: &str) -> Value {
        let response = self.signup(email, TEST_PASSWORD).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }
}

use std::env;
use std::time::Duration;

use auth::HashCost;
use auth::TokenServiceConfig;
use auth::TokenSettings;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::notifiers::SmtpSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Signing settings, one key and lifetime per token purpose.
#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub access: JwtKeyConfig,
    pub refresh: JwtKeyConfig,
    pub reset: JwtKeyConfig,
}

#[derive(Deserialize, Clone)]
pub struct JwtKeyConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

impl std::fmt::Debug for JwtKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeyConfig")
            .field("secret", &"[redacted]")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        let cost = HashCost::default();
        Self {
            memory_kib: cost.memory_kib,
            iterations: cost.iterations,
            parallelism: cost.parallelism,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierTransport {
    Log,
    Smtp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    pub transport: NotifierTransport,
    pub reset_url: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_smtp_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (IDENTITY__DATABASE__URL, IDENTITY__JWT__ACCESS__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: IDENTITY__DATABASE__URL=postgres://... overrides database.url
            .add_source(
                Environment::with_prefix("IDENTITY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings that deserialize but cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()
    }
}

/// Upper bound for any token lifetime: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

impl JwtConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, key) in [
            ("access", &self.access),
            ("refresh", &self.refresh),
            ("reset", &self.reset),
        ] {
            if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&key.ttl_minutes) {
                return Err(ConfigError::Message(format!(
                    "jwt.{}.ttl_minutes must be between 1 and {}, got {}",
                    name, MAX_TOKEN_TTL_MINUTES, key.ttl_minutes
                )));
            }
        }

        Ok(())
    }

    pub fn token_service_config(&self) -> TokenServiceConfig {
        TokenServiceConfig {
            access: self.access.token_settings(),
            refresh: self.refresh.token_settings(),
            reset: self.reset.token_settings(),
        }
    }
}

impl JwtKeyConfig {
    fn token_settings(&self) -> TokenSettings {
        TokenSettings::new(
            self.secret.as_bytes(),
            chrono::Duration::minutes(self.ttl_minutes),
        )
    }
}

impl PasswordConfig {
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

impl SmtpConfig {
    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            from: self.from.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

//! SMTP notifier using the `lettre` crate.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;

use crate::identity::errors::NotifierError;
use crate::identity::models::EmailAddress;
use crate::identity::ports::Notifier;

pub const PASSWORD_RESET_SUBJECT: &str = "Mentorspath Password Reset Request";

/// Submission port that expects TLS from the first byte (SMTPS).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS handshake on connect
    Implicit,
    /// Plain connection upgraded with STARTTLS (587, 25)
    StartTls,
}

impl TlsMode {
    pub fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            TlsMode::Implicit
        } else {
            TlsMode::StartTls
        }
    }
}

/// Connection settings for the SMTP relay.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Mentorspath <no-reply@mentorspath.in>`
    pub from: String,
    pub timeout: Duration,
}

/// Delivers notifications through an authenticated SMTP relay. Port 465 uses
/// implicit TLS, any other port negotiates STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build the relay transport and parse the sender address.
    ///
    /// # Errors
    /// * `MessageBuildFailed` - Sender address is invalid
    /// * `DeliveryFailed` - Relay transport could not be created
    pub fn new(settings: SmtpSettings) -> Result<Self, NotifierError> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotifierError::MessageBuildFailed(format!("Invalid sender: {}", e)))?;

        let builder = match TlsMode::for_port(settings.port) {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host),
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            }
        };

        let transport = builder
            .map_err(|e| {
                NotifierError::DeliveryFailed(format!("Failed to create SMTP transport: {}", e))
            })?
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport, from })
    }
}

pub fn password_reset_body(reset_link: &str) -> String {
    format!(
        "Click this link to reset your mentorspath password:\n\n{}\n\n\
         If you did not request a reset, ignore this email.",
        reset_link
    )
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        reset_link: &str,
    ) -> Result<(), NotifierError> {
        let recipient = to
            .as_str()
            .parse::<Mailbox>()
            .map_err(|e| NotifierError::MessageBuildFailed(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(PASSWORD_RESET_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(password_reset_body(reset_link))
            .map_err(|e| NotifierError::MessageBuildFailed(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifierError::DeliveryFailed(e.to_string()))?;

        tracing::info!(subject = PASSWORD_RESET_SUBJECT, "Password reset email sent");

        Ok(())
    }
}

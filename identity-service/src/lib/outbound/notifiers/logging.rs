//! Development notifier. Writes messages to tracing output instead of sending them.

use async_trait::async_trait;

use super::smtp::password_reset_body;
use super::smtp::PASSWORD_RESET_SUBJECT;
use crate::identity::errors::NotifierError;
use crate::identity::models::EmailAddress;
use crate::identity::ports::Notifier;

/// Logs the full message, reset link included. Never use outside development.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        reset_link: &str,
    ) -> Result<(), NotifierError> {
        tracing::info!(
            to = %to,
            subject = PASSWORD_RESET_SUBJECT,
            "--- EMAIL (log) ---\nTo: {}\nSubject: {}\n\n{}\n--- END EMAIL ---",
            to,
            PASSWORD_RESET_SUBJECT,
            password_reset_body(reset_link)
        );

        Ok(())
    }
}

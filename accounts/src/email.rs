//! Outgoing mail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("relay rejected the message with status {0}")]
    Rejected(u16),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), EmailError>;
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum EmailTransport {
    /// Only logs the message.
    Log,
    /// Posts the message as JSON to a mail relay.
    Http { url: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EmailConfig {
    #[serde(flatten)]
    pub transport: EmailTransport,
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            transport: EmailTransport::Log,
            from: "no-reply@localhost".into(),
        }
    }
}

impl EmailConfig {
    pub fn sender(&self) -> Arc<dyn EmailSender> {
        match &self.transport {
            EmailTransport::Log => Arc::new(LogEmailSender),
            EmailTransport::Http { url } => Arc::new(HttpEmailSender::new(url.clone())),
        }
    }
}

/// Composes account emails and hands them to the configured sender.
#[derive(Clone)]
pub struct Mailer {
    sender: Arc<dyn EmailSender>,
    from: String,
    frontend_url: Url,
}

impl Mailer {
    pub fn new(sender: Arc<dyn EmailSender>, from: String, frontend_url: Url) -> Self {
        Mailer {
            sender,
            from,
            frontend_url,
        }
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.frontend_url.as_str().trim_end_matches('/'),
            token
        )
    }

    pub async fn send_password_reset(
        &self,
        to: &str,
        token: &str,
        valid_for_secs: u64,
    ) -> Result<(), EmailError> {
        let minutes = valid_for_secs / 60;
        let email = Email {
            from: self.from.clone(),
            to: to.to_string(),
            subject: "Password Reset Request".into(),
            text: format!(
                "To reset your password, open the following link: {}\n\
                 If you didn't request this, please ignore this email.\n\
                 This link will expire in {} minutes.",
                self.reset_link(token),
                minutes
            ),
        };
        self.sender.send(email).await
    }
}

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email not delivered, log transport");
        tracing::debug!(text = %email.text, "Email body");
        Ok(())
    }
}

#[derive(Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    url: String,
}

impl HttpEmailSender {
    pub fn new(url: String) -> Self {
        HttpEmailSender {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        let response = self.client.post(&self.url).json(&email).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Rejected(status.as_u16()));
        }
        tracing::debug!(to = %email.to, "Email handed to relay");
        Ok(())
    }
}

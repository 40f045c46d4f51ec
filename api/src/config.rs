use accounts::AuthSettings;
use accounts::BootstrapAdmin;
use accounts::email::EmailConfig;
use docstore::config::StoreConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,
    #[error("Access token lifetime cannot be 0")]
    InvalidTokenLifetime,
    #[error("Email sender address is empty")]
    EmptyEmailSender,
    #[error("Frontend URL must use http or https: {0}")]
    InvalidFrontendUrl(String),
    #[error("Bootstrap admin is invalid: {0}")]
    InvalidBootstrapAdmin(String),
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub listener: Listener,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub email: EmailConfig,
    /// Base URL of the web app, used in links sent by email.
    pub frontend_url: Url,
    /// Admin created on startup when there are no admins.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.auth.access_token_ttl_secs == 0 {
            return Err(ValidationError::InvalidTokenLifetime);
        }
        if self.email.from.trim().is_empty() {
            return Err(ValidationError::EmptyEmailSender);
        }
        if !matches!(self.frontend_url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidFrontendUrl(
                self.frontend_url.to_string(),
            ));
        }
        if let Some(admin) = &self.bootstrap_admin {
            accounts::password::check_strength(&admin.password)
                .map_err(|e| ValidationError::InvalidBootstrapAdmin(e.to_string()))?;
            if !admin.email.contains('@') {
                return Err(ValidationError::InvalidBootstrapAdmin(
                    "email address is invalid".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

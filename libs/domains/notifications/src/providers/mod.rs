//! Email provider implementations.
//!
//! The engine talks to a single [`EmailProvider`] behind an `Arc<dyn _>`.
//! [`SmtpProvider`] delivers through lettre; [`SimulatedProvider`] stands in
//! for development and tests and is the only place failure injection lives.

mod simulated;
mod smtp;

pub use simulated::{SimulatedProvider, SimulationMode, SimulationSettings};
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::{NotificationError, NotificationResult, ProviderError};
use crate::models::EmailMessage;
use async_trait::async_trait;
use core_config::env_or_default;
use std::str::FromStr;
use std::sync::Arc;

/// Represents a sent email with provider-specific message ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
    /// Whether the email was accepted for delivery.
    pub accepted: bool,
}

impl SentEmail {
    pub fn accepted(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            accepted: true,
        }
    }
}

/// Trait for email sending providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<SentEmail, ProviderError>;

    /// Get the provider name for logging and stats.
    fn name(&self) -> &'static str;

    /// Check if the provider is healthy/configured.
    async fn health_check(&self) -> Result<bool, ProviderError>;

    /// Apply runtime failure-injection settings. Real providers ignore them.
    fn apply_simulation(&self, _settings: &SimulationSettings) {}
}

/// Backend selected by `EMAIL_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Smtp,
    Simulated,
}

impl FromStr for ProviderKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(ProviderKind::Smtp),
            "simulated" | "mock" => Ok(ProviderKind::Simulated),
            other => Err(NotificationError::ConfigError(format!(
                "unknown EMAIL_PROVIDER '{other}', expected 'smtp' or 'simulated'"
            ))),
        }
    }
}

impl ProviderKind {
    pub fn from_env() -> NotificationResult<Self> {
        env_or_default("EMAIL_PROVIDER", "simulated").parse()
    }
}

/// Build the provider named by `EMAIL_PROVIDER` from the environment.
pub fn provider_from_env() -> NotificationResult<Arc<dyn EmailProvider>> {
    match ProviderKind::from_env()? {
        ProviderKind::Smtp => {
            use core_config::FromEnv;
            let config = SmtpConfig::from_env()?;
            Ok(Arc::new(SmtpProvider::new(config)?))
        }
        ProviderKind::Simulated => Ok(Arc::new(SimulatedProvider::reliable())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("SMTP".parse::<ProviderKind>().unwrap(), ProviderKind::Smtp);
        assert_eq!(" simulated ".parse::<ProviderKind>().unwrap(), ProviderKind::Simulated);
        assert!("sendgrid".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_from_env_defaults_to_simulated() {
        temp_env::with_var_unset("EMAIL_PROVIDER", || {
            let provider = provider_from_env().unwrap();
            assert_eq!(provider.name(), "simulated");
        });
    }
}

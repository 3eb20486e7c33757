//! Error types for the notifications domain.

use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Template,
    RateLimit,
    Provider,
    RetryExhausted,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Template => "template",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Provider => "provider",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Network hiccup, timeout or 4xx-transient SMTP reply. Retried.
    Transient,
    /// The provider's own sending quota is used up. Not retried.
    QuotaExceeded,
    /// The message was refused outright. Not retried.
    Rejected,
}

/// Failure reported by an [`EmailProvider`](crate::providers::EmailProvider).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} provider error ({kind:?}): {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn transient(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Transient, message)
    }

    pub fn quota_exceeded(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::QuotaExceeded, message)
    }

    pub fn rejected(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Rejected, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Recipient address failed format validation.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Message fields are malformed (empty subject, oversized attachment, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Email address is suppressed (bounced, complained, or unsubscribed).
    #[error("Email address is suppressed: {0}")]
    EmailSuppressed(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template '{template}' is missing required placeholder '{placeholder}'")]
    MissingPlaceholder { template: String, placeholder: String },

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Rate limit exceeded for {scope}")]
    RateLimitExceeded { scope: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every allowed attempt hit a transient provider failure.
    #[error("Delivery failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last_error: ProviderError,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotificationError::InvalidEmail(_)
            | NotificationError::Validation(_)
            | NotificationError::EmailSuppressed(_) => ErrorKind::Validation,
            NotificationError::TemplateNotFound(_)
            | NotificationError::MissingPlaceholder { .. }
            | NotificationError::TemplateError(_) => ErrorKind::Template,
            NotificationError::RateLimitExceeded { .. } => ErrorKind::RateLimit,
            NotificationError::Provider(_) => ErrorKind::Provider,
            NotificationError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            NotificationError::ConfigError(_) => ErrorKind::Config,
            NotificationError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The provider failure behind this error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            NotificationError::Provider(err) => Some(err),
            NotificationError::RetryExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

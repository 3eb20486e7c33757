//! SMTP email provider implementation using lettre.
//!
//! Without TLS the transport talks plain SMTP, which is what local catchers
//! such as Mailpit expect. With TLS it uses a relay with optional credentials.

use super::{EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult, ProviderError};
use crate::models::EmailMessage;
use async_trait::async_trait;
use core_config::{env_flag, env_or_default, env_parse, ConfigError, FromEnv};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, error};

const NAME: &str = "smtp";

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_email: String,
    pub from_name: String,
    /// Optional for dev servers like Mailpit.
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl SmtpConfig {
    pub fn new(host: String, port: u16, from_email: String, from_name: String) -> Self {
        Self {
            host,
            port,
            from_email,
            from_name,
            username: None,
            password: None,
            use_tls: false,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl FromEnv for SmtpConfig {
    /// Defaults target a local Mailpit on port 1025.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025)?,
            from_email: env_or_default("SMTP_FROM_EMAIL", "noreply@localhost"),
            from_name: env_or_default("SMTP_FROM_NAME", "Notifications"),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            use_tls: env_flag("SMTP_USE_TLS", false)?,
        })
    }
}

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| NotificationError::ConfigError(format!("Invalid from address: {}", e)))?;
        let transport = Self::build_transport(&config)?;

        Ok(Self {
            transport,
            config,
            from,
        })
    }

    fn build_transport(config: &SmtpConfig) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username.clone(), password.clone())),
            _ => None,
        };

        let transport = if config.use_tls {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotificationError::ConfigError(format!("Failed to create SMTP relay: {}", e)))?
                .port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        };

        Ok(transport)
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, ProviderError> {
        let to: Mailbox = match &email.recipient_name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, email.recipient).parse(),
            _ => email.recipient.parse(),
        }
        .map_err(|e| ProviderError::rejected(NAME, format!("Invalid to address: {}", e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone());

        let body = match &email.html_body {
            Some(html) => MultiPart::alternative_plain_html(email.body.clone(), html.clone()),
            None => MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone())),
        };

        let message = if email.attachments.is_empty() {
            builder.multipart(body)
        } else {
            let mut mixed = MultiPart::mixed().multipart(body);
            for attachment in &email.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    ProviderError::rejected(
                        NAME,
                        format!("Invalid content type for '{}': {}", attachment.filename, e),
                    )
                })?;
                mixed = mixed.singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.content.clone(), content_type),
                );
            }
            builder.multipart(mixed)
        };

        message.map_err(|e| ProviderError::rejected(NAME, format!("Failed to build email message: {}", e)))
    }
}

fn classify(err: &lettre::transport::smtp::Error) -> ProviderError {
    if err.is_permanent() {
        ProviderError::rejected(NAME, err.to_string())
    } else {
        ProviderError::transient(NAME, err.to_string())
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<SentEmail, ProviderError> {
        debug!(
            to = %email.recipient,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            attachments = email.attachments.len(),
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;
        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.recipient, error = %e, "SMTP send failed");
            classify(&e)
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        Ok(SentEmail {
            message_id,
            accepted: response.is_positive(),
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.transport.test_connection().await.map_err(|e| classify(&e))
    }
}

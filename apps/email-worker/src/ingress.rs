//! Line-delimited JSON ingress.
//!
//! Each non-blank line is one [`EmailCommand`], for example:
//!
//! ```text
//! {"email_type":"welcome","payload":{"email":"ada@example.com","name":"Ada"}}
//! {"email_type":"literal","payload":{"to":"ops@example.com","subject":"Deploy","body":"Done"}}
//! ```
//!
//! Lines that do not parse, or that the engine refuses, are logged and
//! skipped so one bad producer record never stalls the stream.

use domain_notifications::{
    EmailPriority, EmailRequest, JobId, NotificationContent, NotificationEngine,
    NotificationResult, SecurityAlert,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// A request to queue one email.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "email_type", content = "payload", rename_all = "snake_case")]
pub enum EmailCommand {
    Welcome {
        email: String,
        name: String,
        #[serde(default)]
        verification_token: Option<String>,
    },
    Verification {
        email: String,
        name: String,
        token: String,
    },
    PasswordReset {
        email: String,
        name: String,
        token: String,
    },
    Notification {
        email: String,
        name: String,
        notification: NotificationContent,
    },
    ProfileChanged {
        email: String,
        name: String,
        changed_fields: Vec<String>,
    },
    SecurityAlert {
        email: String,
        name: String,
        alert: SecurityAlert,
    },
    /// Any registered template with a caller-supplied data bag.
    Template {
        to: String,
        #[serde(default)]
        name: Option<String>,
        template: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        priority: EmailPriority,
    },
    Literal {
        to: String,
        #[serde(default)]
        name: Option<String>,
        subject: String,
        body: String,
        #[serde(default)]
        html: Option<String>,
        #[serde(default)]
        priority: EmailPriority,
    },
}

impl EmailCommand {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Queue the email this command describes.
    pub fn dispatch(self, engine: &NotificationEngine) -> NotificationResult<JobId> {
        match self {
            EmailCommand::Welcome {
                email,
                name,
                verification_token,
            } => engine.send_welcome_email(&email, &name, verification_token.as_deref()),
            EmailCommand::Verification { email, name, token } => {
                engine.send_verification_email(&email, &name, &token)
            }
            EmailCommand::PasswordReset { email, name, token } => {
                engine.send_password_reset_email(&email, &name, &token)
            }
            EmailCommand::Notification {
                email,
                name,
                notification,
            } => engine.send_notification_email(&email, &name, &notification),
            EmailCommand::ProfileChanged {
                email,
                name,
                changed_fields,
            } => {
                let fields: Vec<&str> = changed_fields.iter().map(String::as_str).collect();
                engine.send_profile_changed_email(&email, &name, &fields)
            }
            EmailCommand::SecurityAlert { email, name, alert } => {
                engine.send_security_alert_email(&email, &name, &alert)
            }
            EmailCommand::Template {
                to,
                name,
                template,
                data,
                priority,
            } => {
                let mut request = EmailRequest::template(to, template, data).with_priority(priority);
                if let Some(name) = name {
                    request = request.with_name(name);
                }
                engine.queue_email(request)
            }
            EmailCommand::Literal {
                to,
                name,
                subject,
                body,
                html,
                priority,
            } => {
                let mut request = EmailRequest::literal(to, subject, body).with_priority(priority);
                if let Some(name) = name {
                    request = request.with_name(name);
                }
                if let Some(html) = html {
                    request = request.with_html(html);
                }
                engine.queue_email(request)
            }
        }
    }
}

/// Outcome of one ingress run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngressSummary {
    pub accepted: usize,
    /// Parsed but refused by the engine.
    pub rejected: usize,
    /// Not a valid command.
    pub malformed: usize,
    /// Stopped by shutdown rather than end of input.
    pub interrupted: bool,
}

/// Queue every command read from `reader` until end of input or shutdown.
pub async fn consume<R>(
    engine: &NotificationEngine,
    reader: R,
    mut shutdown: watch::Receiver<bool>,
) -> IngressSummary
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = IngressSummary::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    loop {
        let next = tokio::select! {
            next = lines.next_line() => next,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    summary.interrupted = true;
                    break;
                }
                continue;
            }
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read email commands");
                break;
            }
        };
        line_no += 1;

        if line.trim().is_empty() {
            continue;
        }

        let command = match EmailCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed email command");
                summary.malformed += 1;
                continue;
            }
        };

        match command.dispatch(engine) {
            Ok(job_id) => {
                debug!(line = line_no, job_id = %job_id, "Email command queued");
                summary.accepted += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, kind = %e.kind(), "Email command rejected");
                summary.rejected += 1;
            }
        }
    }

    summary
}

/// Resolve once the queue is empty and no job is in flight.
pub async fn wait_until_idle(engine: &NotificationEngine, poll: Duration) {
    loop {
        let stats = engine.stats();
        if stats.queue_size == 0 && !stats.is_processing_queue {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}

//! Data models for the notifications domain.

use crate::error::NotificationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier handed back by `queue_email`.
pub type JobId = Uuid;

/// Placeholder values for a template render.
pub type TemplateData = Map<String, Value>;

// ============================================================================
// Messages
// ============================================================================

/// Dispatch priority. The queue drains `High` first, then `Normal`, then `Low`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmailPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl std::fmt::Display for EmailPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailPriority::High => write!(f, "high"),
            EmailPriority::Normal => write!(f, "normal"),
            EmailPriority::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// A fully rendered message, ready for a provider.
///
/// Built by the engine from an admitted [`EmailRequest`] and never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub recipient: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub template_name: Option<String>,
    pub template_data: TemplateData,
    pub attachments: Vec<Attachment>,
    pub priority: EmailPriority,
    pub created_at: DateTime<Utc>,
}

impl EmailMessage {
    pub fn attachment_bytes(&self) -> usize {
        self.attachments.iter().map(|a| a.content.len()).sum()
    }
}

/// What to put in the message: a named template or literal text.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestContent {
    Template { name: String, data: TemplateData },
    Literal {
        subject: String,
        body: String,
        html_body: Option<String>,
    },
}

/// Caller-facing send request accepted by `send`, `queue_email` and `send_batch`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRequest {
    pub recipient: String,
    pub recipient_name: Option<String>,
    pub content: RequestContent,
    pub attachments: Vec<Attachment>,
    pub priority: EmailPriority,
}

impl EmailRequest {
    /// Render `template` with `data`. Anything other than a JSON object is
    /// treated as an empty data bag.
    pub fn template(recipient: impl Into<String>, template: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self::with_content(
            recipient,
            RequestContent::Template {
                name: template.into(),
                data,
            },
        )
    }

    pub fn literal(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::with_content(
            recipient,
            RequestContent::Literal {
                subject: subject.into(),
                body: body.into(),
                html_body: None,
            },
        )
    }

    fn with_content(recipient: impl Into<String>, content: RequestContent) -> Self {
        Self {
            recipient: recipient.into(),
            recipient_name: None,
            content,
            attachments: Vec::new(),
            priority: EmailPriority::Normal,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: EmailPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Set the HTML alternative of a literal request. No effect on template requests.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        if let RequestContent::Literal { html_body, .. } = &mut self.content {
            *html_body = Some(html.into());
        }
        self
    }

    pub fn template_name(&self) -> Option<&str> {
        match &self.content {
            RequestContent::Template { name, .. } => Some(name),
            RequestContent::Literal { .. } => None,
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
    /// The provider reported its quota as exhausted.
    RateLimited,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::InFlight)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InFlight => write!(f, "in_flight"),
            JobStatus::Sent => write!(f, "sent"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::RateLimited => write!(f, "rate_limited"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A queued message and its delivery state.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: JobId,
    pub message: EmailMessage,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
}

impl DispatchJob {
    pub fn new(message: EmailMessage) -> Self {
        Self {
            id: Uuid::now_v7(),
            message,
            attempt_count: 0,
            last_error: None,
            status: JobStatus::Pending,
            enqueued_at: Utc::now(),
        }
    }
}

/// Outcome of a queued job as seen through `job_status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub recipient: String,
    pub subject: String,
    pub template_name: Option<String>,
    pub priority: EmailPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub provider_message_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(job: &DispatchJob) -> Self {
        Self {
            id: job.id,
            recipient: job.message.recipient.clone(),
            subject: job.message.subject.clone(),
            template_name: job.message.template_name.clone(),
            priority: job.message.priority,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            provider_message_id: None,
            enqueued_at: job.enqueued_at,
            completed_at: None,
        }
    }
}

/// Proof of a successful hand-off to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryReport {
    pub recipient: String,
    pub subject: String,
    pub template_name: Option<String>,
    pub provider: String,
    pub provider_message_id: Option<String>,
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}

// ============================================================================
// Batches
// ============================================================================

/// How `send_batch` treats its requests.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Deliver each request immediately with bounded concurrency.
    #[default]
    Send,
    /// Enqueue every request for the drain worker.
    Queue,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub recipient: String,
    pub error: NotificationError,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    /// Ordered by request index.
    pub failures: Vec<BatchFailure>,
}

// ============================================================================
// Suppressions
// ============================================================================

/// Reason for email suppression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    Bounce,
    Complaint,
    Unsubscribe,
}

impl std::fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressionReason::Bounce => write!(f, "bounce"),
            SuppressionReason::Complaint => write!(f, "complaint"),
            SuppressionReason::Unsubscribe => write!(f, "unsubscribe"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSuppression {
    pub email: String,
    pub reason: SuppressionReason,
    pub created_at: DateTime<Utc>,
}

impl EmailSuppression {
    pub fn new(email: String, reason: SuppressionReason) -> Self {
        Self {
            email,
            reason,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Template Data Structures
// ============================================================================

/// Data for rendering the welcome email template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeEmailData {
    pub user_name: String,
    pub user_email: String,
    pub verification_url: Option<String>,
    pub verification_expiry_hours: u32,
    pub dashboard_url: String,
    pub join_date: String,
    pub logo_url: String,
    pub help_url: String,
    pub company_name: String,
    pub company_address: String,
}

/// Shared by the verification and password reset templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLinkEmailData {
    pub user_name: String,
    pub action_url: String,
    pub expiry_hours: u32,
    pub logo_url: String,
    pub help_url: String,
    pub company_name: String,
    pub company_address: String,
}

/// A generic in-app notification mirrored to email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEmailData {
    pub user_name: String,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub preferences_url: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileChangedEmailData {
    pub user_name: String,
    pub changed_fields: String,
    pub changed_at: String,
    pub settings_url: String,
    pub help_url: String,
    pub company_name: String,
}

/// A security-relevant account event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityAlert {
    /// Short description such as "New sign-in" or "Password changed".
    pub alert_type: String,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlertEmailData {
    pub user_name: String,
    pub alert_type: String,
    pub occurred_at: String,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub secure_account_url: String,
    pub company_name: String,
}

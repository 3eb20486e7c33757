//! Notifications Domain
//!
//! In-process email dispatch: template rendering, address validation,
//! rate limiting, a priority queue with retries, and pluggable providers.
//!
//! # Features
//!
//! - Immediate sends and queued sends through one admission pipeline
//! - Built-in templates for welcome, verification, password reset,
//!   notification, profile change and security alert emails
//! - Global and per-recipient rate windows
//! - Exponential backoff for transient provider failures
//! - Simulated provider for development and tests, SMTP for real delivery
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Caller      │  ← send / queue_email / send_batch
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Admission     │  ← validate, render, rate-limit
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ DispatchQueue   │  ← high / normal / low lanes
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  Drain worker   │  ← one job at a time, retries with backoff
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Email Provider  │  ← SMTP, simulated
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{NotificationEngine, SimulatedProvider};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(
//!     NotificationEngine::builder()
//!         .provider(Arc::new(SimulatedProvider::reliable()))
//!         .build()?,
//! );
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let worker = engine.spawn_worker(shutdown_rx);
//!
//! engine.send_welcome_email("ada@example.com", "Ada", None)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod providers;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod stats;
pub mod templates;

// Re-export commonly used types
pub use config::{BrandingConfig, ConfigureOptions, EngineConfig};
pub use engine::{DrainSummary, NotificationEngine, NotificationEngineBuilder};
pub use error::{ErrorKind, NotificationError, NotificationResult, ProviderError, ProviderErrorKind};
pub use models::{
    Attachment, BatchFailure, BatchMode, BatchResult, DeliveryReport, EmailMessage, EmailPriority,
    EmailRequest, EmailSuppression, JobId, JobRecord, JobStatus, NotificationContent, SecurityAlert,
    SuppressionReason,
};
pub use providers::{EmailProvider, SimulatedProvider, SimulationMode, SmtpConfig, SmtpProvider};
pub use rate_limit::{RateLimiter, RateLimits, RateScope};
pub use retry::RetryPolicy;
pub use stats::EmailStats;
pub use templates::{RenderedEmail, TemplateDefinition, TemplateEngine};

//! The email dispatch engine.
//!
//! Both entry points run the same admission pipeline (validate, render,
//! rate-limit) before touching the provider. `send` then delivers inline;
//! `queue_email` hands the message to the in-memory queue, which a single
//! cooperative drain empties one job at a time.

use crate::config::{BrandingConfig, ConfigureOptions, EngineConfig};
use crate::error::{NotificationError, NotificationResult, ProviderError, ProviderErrorKind};
use crate::models::{
    ActionLinkEmailData, BatchFailure, BatchMode, BatchResult, DeliveryReport, DispatchJob,
    EmailMessage, EmailPriority, EmailRequest, EmailSuppression, JobId, JobRecord, JobStatus,
    NotificationContent, NotificationEmailData, ProfileChangedEmailData, RequestContent,
    SecurityAlert, SecurityAlertEmailData, SuppressionReason, TemplateData, WelcomeEmailData,
};
use crate::providers::{provider_from_env, EmailProvider, SentEmail};
use crate::queue::DispatchQueue;
use crate::rate_limit::{RateLimiter, RateScope};
use crate::retry::RetryPolicy;
use crate::stats::{EmailStats, EngineGauges, StatsCollector};
use crate::templates::{builtin, TemplateDefinition, TemplateEngine};
use chrono::Utc;
use core_config::FromEnv;
use futures::stream::{self, StreamExt};
use rand::distr::Alphanumeric;
use rand::RngExt;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use validator::ValidateEmail;

/// Counts from one `process_queue` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub rate_limited: usize,
}

impl DrainSummary {
    fn record(&mut self, status: JobStatus) {
        self.processed += 1;
        match status {
            JobStatus::Sent => self.sent += 1,
            JobStatus::RateLimited => self.rate_limited += 1,
            _ => self.failed += 1,
        }
    }
}

/// Job records by id, with finished ones evicted oldest first.
#[derive(Debug, Default)]
struct JobBook {
    records: HashMap<JobId, JobRecord>,
    finished: VecDeque<JobId>,
}

impl JobBook {
    fn insert(&mut self, record: JobRecord) {
        self.records.insert(record.id, record);
    }

    fn mark_in_flight(&mut self, id: JobId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.status = JobStatus::InFlight;
        }
    }

    fn finish(&mut self, job: &DispatchJob, provider_message_id: Option<String>, capacity: usize) {
        if let Some(record) = self.records.get_mut(&job.id) {
            record.status = job.status;
            record.attempts = job.attempt_count;
            record.last_error = job.last_error.clone();
            record.provider_message_id = provider_message_id;
            record.completed_at = Some(Utc::now());
        }

        self.finished.push_back(job.id);
        while self.finished.len() > capacity.max(1) {
            if let Some(evicted) = self.finished.pop_front() {
                self.records.remove(&evicted);
            }
        }
    }
}

/// Clears the drain flag however the drain ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct NotificationEngine {
    provider: Arc<dyn EmailProvider>,
    templates: TemplateEngine,
    branding: BrandingConfig,
    config: RwLock<EngineConfig>,
    /// Held by `configure` and by the drain for the duration of each job.
    config_gate: tokio::sync::Mutex<()>,
    rate_limiter: RateLimiter,
    queue: Mutex<DispatchQueue>,
    jobs: Mutex<JobBook>,
    deliveries: Mutex<VecDeque<DeliveryReport>>,
    suppressions: RwLock<HashMap<String, EmailSuppression>>,
    stats: StatsCollector,
    processing: AtomicBool,
    wake: Notify,
}

/// Builder for [`NotificationEngine`]. A provider is required.
#[derive(Default)]
pub struct NotificationEngineBuilder {
    provider: Option<Arc<dyn EmailProvider>>,
    templates: Option<TemplateEngine>,
    extra_templates: Vec<TemplateDefinition>,
    branding: BrandingConfig,
    config: EngineConfig,
}

impl NotificationEngineBuilder {
    pub fn provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the built-in template set.
    pub fn templates(mut self, templates: TemplateEngine) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Register one more template on top of the template set.
    pub fn template(mut self, definition: TemplateDefinition) -> Self {
        self.extra_templates.push(definition);
        self
    }

    pub fn branding(mut self, branding: BrandingConfig) -> Self {
        self.branding = branding;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> NotificationResult<NotificationEngine> {
        let provider = self.provider.ok_or_else(|| {
            NotificationError::ConfigError("an email provider is required".to_string())
        })?;

        let mut templates = match self.templates {
            Some(templates) => templates,
            None => TemplateEngine::new()?,
        };
        for definition in self.extra_templates {
            templates.register(definition)?;
        }

        provider.apply_simulation(&self.config.simulation());

        info!(
            provider = provider.name(),
            templates = templates.len(),
            daily_limit = self.config.daily_limit,
            rate_limit_enabled = self.config.enable_rate_limit,
            max_attempts = self.config.retry.max_attempts,
            "Notification engine ready"
        );

        Ok(NotificationEngine {
            stats: StatsCollector::new(provider.name()),
            rate_limiter: RateLimiter::new(self.config.rate_limits()),
            provider,
            templates,
            branding: self.branding,
            config: RwLock::new(self.config),
            config_gate: tokio::sync::Mutex::new(()),
            queue: Mutex::new(DispatchQueue::new()),
            jobs: Mutex::new(JobBook::default()),
            deliveries: Mutex::new(VecDeque::new()),
            suppressions: RwLock::new(HashMap::new()),
            processing: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Surrounding whitespace is ignored, the same way recipients are trimmed
/// before delivery.
fn is_valid_address(address: &str) -> bool {
    let address = address.trim();
    !address.is_empty() && address.validate_email()
}

fn validate_message(message: &EmailMessage, max_attachment_bytes: usize) -> NotificationResult<()> {
    if message.subject.trim().is_empty() {
        return Err(NotificationError::Validation("subject must not be empty".to_string()));
    }
    if message.subject.contains(['\r', '\n']) {
        return Err(NotificationError::Validation("subject must be a single line".to_string()));
    }
    if message.body.trim().is_empty() && message.html_body.is_none() {
        return Err(NotificationError::Validation("body must not be empty".to_string()));
    }
    if let Some(unnamed) = message.attachments.iter().position(|a| a.filename.trim().is_empty()) {
        return Err(NotificationError::Validation(format!(
            "attachment #{} has no filename",
            unnamed + 1
        )));
    }

    let total = message.attachment_bytes();
    if total > max_attachment_bytes {
        return Err(NotificationError::Validation(format!(
            "attachments total {total} bytes, limit is {max_attachment_bytes}"
        )));
    }
    Ok(())
}

impl NotificationEngine {
    pub fn builder() -> NotificationEngineBuilder {
        NotificationEngineBuilder::default()
    }

    /// Provider, limits and branding all read from the environment.
    pub fn from_env() -> NotificationResult<Self> {
        Self::builder()
            .provider(provider_from_env()?)
            .branding(BrandingConfig::from_env()?)
            .config(EngineConfig::from_env()?)
            .build()
    }

    /// Generate a secure random token for verification and reset links.
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    }

    pub fn config(&self) -> EngineConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn branding(&self) -> &BrandingConfig {
        &self.branding
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    // ------------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------------

    /// Check an address without touching the queue or the limiter.
    pub fn validate(&self, address: &str) -> bool {
        let valid = is_valid_address(address);
        self.stats.record_validated(valid);
        valid
    }

    fn prepare(&self, request: EmailRequest, config: &EngineConfig) -> NotificationResult<EmailMessage> {
        let recipient = request.recipient.trim().to_string();
        if !is_valid_address(&recipient) {
            return Err(NotificationError::InvalidEmail(recipient));
        }
        if let Some(suppression) = self.suppression(&recipient) {
            return Err(NotificationError::EmailSuppressed(format!(
                "{} ({})",
                recipient, suppression.reason
            )));
        }

        let (subject, body, html_body, template_name, template_data) = match request.content {
            RequestContent::Template { name, data } => {
                let rendered = self.templates.render(&name, &data)?;
                (rendered.subject, rendered.text, rendered.html, Some(name), data)
            }
            RequestContent::Literal {
                subject,
                body,
                html_body,
            } => (subject, body, html_body, None, TemplateData::new()),
        };

        let message = EmailMessage {
            recipient,
            recipient_name: request.recipient_name,
            subject,
            body,
            html_body,
            template_name,
            template_data,
            attachments: request.attachments,
            priority: request.priority,
            created_at: Utc::now(),
        };
        validate_message(&message, config.max_attachment_bytes)?;
        Ok(message)
    }

    fn admit(&self, message: &EmailMessage) -> NotificationResult<()> {
        let scopes = [RateScope::Global, RateScope::recipient(&message.recipient)];
        self.rate_limiter.admit_all(&scopes).map_err(|scope| {
            let scope = scope.key(self.rate_limiter.limits().period);
            self.stats.record_rate_limited();
            warn!(to = %message.recipient, scope = %scope, "Rate limit exceeded");
            NotificationError::RateLimitExceeded { scope }
        })
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    async fn deliver(
        &self,
        message: &EmailMessage,
        policy: &RetryPolicy,
        attempts: &mut u32,
    ) -> NotificationResult<SentEmail> {
        loop {
            *attempts += 1;
            let err = match self.provider.send(message).await {
                Ok(sent) if sent.accepted => return Ok(sent),
                Ok(sent) => ProviderError::rejected(
                    self.provider.name(),
                    format!("message not accepted (id: {:?})", sent.message_id),
                ),
                Err(err) => err,
            };

            if policy.should_retry(*attempts, &err) {
                let delay = policy.delay_for_attempt(*attempts);
                self.stats.record_retry();
                warn!(
                    to = %message.recipient,
                    attempt = *attempts,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(if err.is_transient() {
                NotificationError::RetryExhausted {
                    attempts: *attempts,
                    last_error: err,
                }
            } else {
                NotificationError::Provider(err)
            });
        }
    }

    fn record_delivery(
        &self,
        message: &EmailMessage,
        sent: SentEmail,
        attempts: u32,
        elapsed: Duration,
        config: &EngineConfig,
    ) -> DeliveryReport {
        self.stats.record_sent(elapsed);

        let report = DeliveryReport {
            recipient: message.recipient.clone(),
            subject: message.subject.clone(),
            template_name: message.template_name.clone(),
            provider: self.provider.name().to_string(),
            provider_message_id: sent.message_id,
            attempts,
            delivered_at: Utc::now(),
        };

        if config.enable_tracking {
            let mut log = lock(&self.deliveries);
            log.push_back(report.clone());
            while log.len() > config.tracking_capacity.max(1) {
                log.pop_front();
            }
        }
        report
    }

    async fn send_with(&self, request: EmailRequest, config: &EngineConfig) -> NotificationResult<DeliveryReport> {
        let message = self.prepare(request, config)?;
        self.admit(&message)?;

        let started = Instant::now();
        let mut attempts = 0;
        let sent = self.deliver(&message, &config.retry, &mut attempts).await?;
        Ok(self.record_delivery(&message, sent, attempts, started.elapsed(), config))
    }

    /// Validate, render, admit and deliver now, retrying transient failures.
    pub async fn send(&self, request: EmailRequest) -> NotificationResult<DeliveryReport> {
        let config = self.config();
        let result = self.send_with(request, &config).await;

        match &result {
            Ok(report) => info!(
                to = %report.recipient,
                attempts = report.attempts,
                message_id = ?report.provider_message_id,
                "Email sent"
            ),
            Err(err) => {
                self.stats.record_failed(err.kind());
                warn!(error = %err, kind = %err.kind(), "Email send failed");
            }
        }
        result
    }

    /// Admit the request and enqueue it for the drain worker.
    ///
    /// Delivery failures after this point never reach the caller; they land in
    /// the stats and in the job's [`JobRecord`].
    pub fn queue_email(&self, request: EmailRequest) -> NotificationResult<JobId> {
        let config = self.config();
        let prepared = self
            .prepare(request, &config)
            .and_then(|message| self.admit(&message).map(|_| message));

        let message = match prepared {
            Ok(message) => message,
            Err(err) => {
                self.stats.record_failed(err.kind());
                warn!(error = %err, kind = %err.kind(), "Email rejected before queueing");
                return Err(err);
            }
        };

        let job = DispatchJob::new(message);
        let id = job.id;
        let (recipient, priority) = (job.message.recipient.clone(), job.message.priority);

        lock(&self.jobs).insert(JobRecord::pending(&job));
        let depth = {
            let mut queue = lock(&self.queue);
            queue.enqueue(job);
            queue.len()
        };
        self.stats.metrics().queue_depth(depth);
        self.wake.notify_one();

        debug!(job_id = %id, to = %recipient, priority = %priority, queue_size = depth, "Queued email job");
        Ok(id)
    }

    /// Deliver each request; one failure never aborts the others.
    pub async fn send_batch(&self, requests: Vec<EmailRequest>) -> BatchResult {
        let config = self.config();
        let total = requests.len();

        let outcomes: Vec<(usize, String, NotificationResult<()>)> = match config.batch_mode {
            BatchMode::Send => {
                stream::iter(requests.into_iter().enumerate())
                    .map(|(index, request)| async move {
                        let recipient = request.recipient.clone();
                        (index, recipient, self.send(request).await.map(|_| ()))
                    })
                    .buffer_unordered(config.batch_concurrency.max(1))
                    .collect()
                    .await
            }
            BatchMode::Queue => requests
                .into_iter()
                .enumerate()
                .map(|(index, request)| {
                    let recipient = request.recipient.clone();
                    (index, recipient, self.queue_email(request).map(|_| ()))
                })
                .collect(),
        };

        let mut result = BatchResult::default();
        for (index, recipient, outcome) in outcomes {
            match outcome {
                Ok(()) => result.successful += 1,
                Err(error) => {
                    result.failed += 1;
                    result.failures.push(BatchFailure {
                        index,
                        recipient,
                        error,
                    });
                }
            }
        }
        result.failures.sort_by_key(|failure| failure.index);

        info!(
            total,
            successful = result.successful,
            failed = result.failed,
            mode = ?config.batch_mode,
            "Batch processed"
        );
        result
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    /// Drain the queue once. Returns `None` if another drain is running.
    pub async fn process_queue(&self) -> Option<DrainSummary> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Queue drain already in progress");
            return None;
        }
        let _guard = ProcessingGuard(&self.processing);

        let mut summary = DrainSummary::default();
        loop {
            let _gate = self.config_gate.lock().await;
            let next = lock(&self.queue).dequeue_next();
            let Some(job) = next else {
                break;
            };

            let config = self.config();
            let status = self.process_job(job, &config).await;
            summary.record(status);
        }

        self.stats.metrics().queue_depth(lock(&self.queue).len());
        if summary.processed > 0 {
            info!(
                processed = summary.processed,
                sent = summary.sent,
                failed = summary.failed,
                rate_limited = summary.rate_limited,
                "Queue drained"
            );
        }
        Some(summary)
    }

    async fn process_job(&self, mut job: DispatchJob, config: &EngineConfig) -> JobStatus {
        job.status = JobStatus::InFlight;
        lock(&self.jobs).mark_in_flight(job.id);

        let started = Instant::now();
        let mut attempts = job.attempt_count;
        let outcome = self.deliver(&job.message, &config.retry, &mut attempts).await;
        job.attempt_count = attempts;

        let message_id = match outcome {
            Ok(sent) => {
                let report = self.record_delivery(&job.message, sent, attempts, started.elapsed(), config);
                job.status = JobStatus::Sent;
                info!(
                    job_id = %job.id,
                    to = %job.message.recipient,
                    attempts,
                    message_id = ?report.provider_message_id,
                    "Email job delivered"
                );
                report.provider_message_id
            }
            Err(err) => {
                self.stats.record_failed(err.kind());
                job.status = match err.provider_error() {
                    Some(cause) if cause.kind == ProviderErrorKind::QuotaExceeded => JobStatus::RateLimited,
                    _ => JobStatus::Failed,
                };
                job.last_error = Some(err.to_string());
                error!(
                    job_id = %job.id,
                    to = %job.message.recipient,
                    attempts,
                    status = %job.status,
                    error = %err,
                    "Email job failed"
                );
                None
            }
        };

        lock(&self.jobs).finish(&job, message_id, config.tracking_capacity);
        job.status
    }

    /// Remove a job that has not been picked up yet.
    ///
    /// Returns `false` when the job is unknown, in flight or already finished.
    pub fn cancel(&self, id: JobId) -> bool {
        let removed = lock(&self.queue).remove(id);
        let Some(mut job) = removed else {
            return false;
        };

        job.status = JobStatus::Cancelled;
        let capacity = self.config().tracking_capacity;
        lock(&self.jobs).finish(&job, None, capacity);
        info!(job_id = %id, to = %job.message.recipient, "Cancelled queued email job");
        true
    }

    pub fn job_status(&self, id: JobId) -> Option<JobRecord> {
        lock(&self.jobs).records.get(&id).cloned()
    }

    /// Ids of queued jobs in dispatch order.
    pub fn pending_jobs(&self) -> Vec<JobId> {
        lock(&self.queue).pending_ids()
    }

    /// Run the drain loop on a background task until `shutdown` turns true
    /// or its sender is dropped.
    pub fn spawn_worker(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_worker(shutdown).await })
    }

    async fn run_worker(&self, mut shutdown: watch::Receiver<bool>) {
        info!(provider = self.provider.name(), "Email dispatch worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.process_queue().await;

            tokio::select! {
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let pending = lock(&self.queue).len();
        if pending > 0 {
            warn!(pending, "Email dispatch worker stopped with jobs still queued");
        } else {
            info!("Email dispatch worker stopped");
        }
    }

    // ------------------------------------------------------------------------
    // Observation and control
    // ------------------------------------------------------------------------

    pub fn stats(&self) -> EmailStats {
        self.stats.snapshot(EngineGauges {
            queue_size: lock(&self.queue).len(),
            templates_loaded: self.templates.len(),
            is_processing_queue: self.processing.load(Ordering::Acquire),
        })
    }

    /// Successful deliveries retained while tracking is enabled, oldest first.
    pub fn delivery_log(&self) -> Vec<DeliveryReport> {
        lock(&self.deliveries).iter().cloned().collect()
    }

    /// Apply a partial configuration update between drain jobs.
    pub async fn configure(&self, options: ConfigureOptions) -> NotificationResult<EngineConfig> {
        options.validate()?;
        let _gate = self.config_gate.lock().await;

        let updated = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            config.apply(&options);
            config.clone()
        };
        self.rate_limiter.set_limits(updated.rate_limits());
        self.provider.apply_simulation(&updated.simulation());

        info!(
            daily_limit = updated.daily_limit,
            rate_limit_enabled = updated.enable_rate_limit,
            tracking_enabled = updated.enable_tracking,
            should_fail_send = updated.should_fail_send,
            failure_rate = updated.failure_rate,
            max_attempts = updated.retry.max_attempts,
            "Notification engine reconfigured"
        );
        Ok(updated)
    }

    pub async fn health_check(&self) -> NotificationResult<bool> {
        Ok(self.provider.health_check().await?)
    }

    // ------------------------------------------------------------------------
    // Suppressions
    // ------------------------------------------------------------------------

    pub fn suppress(&self, address: &str, reason: SuppressionReason) {
        let key = address.trim().to_ascii_lowercase();
        info!(email = %key, reason = %reason, "Suppressing email address");
        self.suppressions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), EmailSuppression::new(key, reason));
    }

    /// Returns whether the address was suppressed.
    pub fn unsuppress(&self, address: &str) -> bool {
        self.suppressions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&address.trim().to_ascii_lowercase())
            .is_some()
    }

    pub fn suppression(&self, address: &str) -> Option<EmailSuppression> {
        self.suppressions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address.trim().to_ascii_lowercase())
            .cloned()
    }

    // ------------------------------------------------------------------------
    // Convenience senders
    // ------------------------------------------------------------------------

    fn queue_template<T: Serialize>(
        &self,
        email: &str,
        name: &str,
        template: &str,
        data: &T,
        priority: EmailPriority,
    ) -> NotificationResult<JobId> {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(err) => {
                let err = NotificationError::from(err);
                self.stats.record_failed(err.kind());
                return Err(err);
            }
        };

        self.queue_email(
            EmailRequest::template(email, template, data)
                .with_name(name)
                .with_priority(priority),
        )
    }

    /// Welcome email, with a verification link when a token is given.
    pub fn send_welcome_email(
        &self,
        email: &str,
        name: &str,
        verification_token: Option<&str>,
    ) -> NotificationResult<JobId> {
        let branding = &self.branding;
        let data = WelcomeEmailData {
            user_name: name.to_string(),
            user_email: email.to_string(),
            verification_url: verification_token
                .map(|token| branding.url(&format!("/auth/verify-email?token={token}"))),
            verification_expiry_hours: branding.verification_expiry_hours,
            dashboard_url: branding.url("/dashboard"),
            join_date: Utc::now().format("%B %d, %Y").to_string(),
            logo_url: branding.logo_url.clone(),
            help_url: branding.url("/help"),
            company_name: branding.company_name.clone(),
            company_address: branding.company_address.clone(),
        };

        self.queue_template(email, name, builtin::WELCOME, &data, EmailPriority::Normal)
    }

    pub fn send_verification_email(
        &self,
        email: &str,
        name: &str,
        verification_token: &str,
    ) -> NotificationResult<JobId> {
        let data = self.action_link_data(
            name,
            &format!("/auth/verify-email?token={verification_token}"),
            self.branding.verification_expiry_hours,
        );
        self.queue_template(email, name, builtin::VERIFICATION, &data, EmailPriority::High)
    }

    pub fn send_password_reset_email(
        &self,
        email: &str,
        name: &str,
        reset_token: &str,
    ) -> NotificationResult<JobId> {
        let data = self.action_link_data(
            name,
            &format!("/auth/reset-password?token={reset_token}"),
            self.branding.password_reset_expiry_hours,
        );
        self.queue_template(email, name, builtin::PASSWORD_RESET, &data, EmailPriority::High)
    }

    fn action_link_data(&self, name: &str, path: &str, expiry_hours: u32) -> ActionLinkEmailData {
        ActionLinkEmailData {
            user_name: name.to_string(),
            action_url: self.branding.url(path),
            expiry_hours,
            logo_url: self.branding.logo_url.clone(),
            help_url: self.branding.url("/help"),
            company_name: self.branding.company_name.clone(),
            company_address: self.branding.company_address.clone(),
        }
    }

    pub fn send_notification_email(
        &self,
        email: &str,
        name: &str,
        notification: &NotificationContent,
    ) -> NotificationResult<JobId> {
        let data = NotificationEmailData {
            user_name: name.to_string(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            action_url: notification.action_url.clone(),
            action_label: notification.action_label.clone(),
            preferences_url: self.branding.url("/settings/notifications"),
            company_name: self.branding.company_name.clone(),
        };
        self.queue_template(email, name, builtin::NOTIFICATION, &data, EmailPriority::Normal)
    }

    pub fn send_profile_changed_email(
        &self,
        email: &str,
        name: &str,
        changed_fields: &[&str],
    ) -> NotificationResult<JobId> {
        let data = ProfileChangedEmailData {
            user_name: name.to_string(),
            changed_fields: changed_fields.join(", "),
            changed_at: Utc::now().format("%B %d, %Y %H:%M UTC").to_string(),
            settings_url: self.branding.url("/settings/profile"),
            help_url: self.branding.url("/help"),
            company_name: self.branding.company_name.clone(),
        };
        self.queue_template(email, name, builtin::PROFILE_CHANGED, &data, EmailPriority::Normal)
    }

    pub fn send_security_alert_email(
        &self,
        email: &str,
        name: &str,
        alert: &SecurityAlert,
    ) -> NotificationResult<JobId> {
        let data = SecurityAlertEmailData {
            user_name: name.to_string(),
            alert_type: alert.alert_type.clone(),
            occurred_at: alert.occurred_at.format("%B %d, %Y %H:%M UTC").to_string(),
            ip_address: alert.ip_address.clone(),
            location: alert.location.clone(),
            secure_account_url: self.branding.url("/settings/security"),
            company_name: self.branding.company_name.clone(),
        };
        self.queue_template(email, name, builtin::SECURITY_ALERT, &data, EmailPriority::High)
    }
}

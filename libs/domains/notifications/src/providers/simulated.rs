//! In-process provider with configurable failure behaviour.

use super::{EmailProvider, SentEmail};
use crate::error::ProviderError;
use crate::models::EmailMessage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const NAME: &str = "simulated";

/// Accepted messages kept for inspection; older ones are evicted first.
pub const DEFAULT_RECORD_LIMIT: usize = 1000;

/// Behaviour fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationMode {
    /// Accept every message.
    Reliable,
    /// Accept every message after `delay`.
    Latent { delay: Duration },
    /// Fail transiently with probability `failure_rate`.
    Unstable { failure_rate: f64 },
    /// Accept `quota` messages, then report the quota as exhausted.
    QuotaLimited { quota: u32 },
    /// Fail the first `failures` calls transiently, then accept.
    Flaky { failures: u32 },
}

/// Runtime overrides pushed by the engine's `configure`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSettings {
    pub send_delay: Duration,
    pub should_fail_send: bool,
    pub failure_rate: f64,
}

#[derive(Default)]
struct Delivered {
    accepted: usize,
    recent: VecDeque<EmailMessage>,
}

pub struct SimulatedProvider {
    mode: SimulationMode,
    settings: RwLock<SimulationSettings>,
    calls: AtomicU32,
    record_limit: usize,
    delivered: Mutex<Delivered>,
}

impl SimulatedProvider {
    pub fn new(mode: SimulationMode) -> Self {
        Self {
            mode,
            settings: RwLock::new(SimulationSettings::default()),
            calls: AtomicU32::new(0),
            record_limit: DEFAULT_RECORD_LIMIT,
            delivered: Mutex::new(Delivered::default()),
        }
    }

    /// Keep at most `limit` accepted messages for inspection.
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit;
        self
    }

    pub fn reliable() -> Self {
        Self::new(SimulationMode::Reliable)
    }

    pub fn latent(delay: Duration) -> Self {
        Self::new(SimulationMode::Latent { delay })
    }

    pub fn unstable(failure_rate: f64) -> Self {
        Self::new(SimulationMode::Unstable { failure_rate })
    }

    pub fn quota_limited(quota: u32) -> Self {
        Self::new(SimulationMode::QuotaLimited { quota })
    }

    pub fn flaky(failures: u32) -> Self {
        Self::new(SimulationMode::Flaky { failures })
    }

    pub fn mode(&self) -> &SimulationMode {
        &self.mode
    }

    pub fn settings(&self) -> SimulationSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `send` calls, successful or not.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recently accepted messages, oldest first, up to the record limit.
    pub async fn sent_emails(&self) -> Vec<EmailMessage> {
        self.delivered.lock().await.recent.iter().cloned().collect()
    }

    /// Total messages accepted, including those evicted from the record.
    pub async fn sent_count(&self) -> usize {
        self.delivered.lock().await.accepted
    }

    pub async fn was_sent_to(&self, recipient: &str) -> bool {
        self.delivered
            .lock()
            .await
            .recent
            .iter()
            .any(|email| email.recipient.eq_ignore_ascii_case(recipient))
    }

    pub async fn clear(&self) {
        *self.delivered.lock().await = Delivered::default();
        self.calls.store(0, Ordering::SeqCst);
    }

    fn delay(&self, settings: &SimulationSettings) -> Duration {
        match self.mode {
            SimulationMode::Latent { delay } => settings.send_delay + delay,
            _ => settings.send_delay,
        }
    }

    fn failure_rate(&self, settings: &SimulationSettings) -> f64 {
        let base = match self.mode {
            SimulationMode::Unstable { failure_rate } => failure_rate,
            _ => 0.0,
        };
        base.max(settings.failure_rate).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl EmailProvider for SimulatedProvider {
    async fn send(&self, email: &EmailMessage) -> Result<SentEmail, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let settings = self.settings();

        let delay = self.delay(&settings);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if settings.should_fail_send {
            return Err(ProviderError::transient(NAME, "simulated send failure"));
        }

        let failure_rate = self.failure_rate(&settings);
        if failure_rate > 0.0 && rand::random::<f64>() < failure_rate {
            return Err(ProviderError::transient(NAME, "simulated random failure"));
        }

        if let SimulationMode::Flaky { failures } = self.mode {
            if call <= failures {
                return Err(ProviderError::transient(
                    NAME,
                    format!("simulated transient failure {call}/{failures}"),
                ));
            }
        }

        let mut delivered = self.delivered.lock().await;
        if let SimulationMode::QuotaLimited { quota } = self.mode {
            if delivered.accepted >= quota as usize {
                return Err(ProviderError::quota_exceeded(
                    NAME,
                    format!("simulated quota of {quota} messages exhausted"),
                ));
            }
        }

        delivered.accepted += 1;
        if self.record_limit > 0 {
            if delivered.recent.len() >= self.record_limit {
                delivered.recent.pop_front();
            }
            delivered.recent.push_back(email.clone());
        }
        let message_id = format!("sim-{}", Uuid::new_v4());
        debug!(to = %email.recipient, message_id = %message_id, "Simulated delivery");

        Ok(SentEmail::accepted(message_id))
    }

    fn name(&self) -> &'static str {
        NAME
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(!self.settings().should_fail_send)
    }

    fn apply_simulation(&self, settings: &SimulationSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
    }
}

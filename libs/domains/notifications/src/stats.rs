//! Delivery counters and their metrics mirror.

use crate::error::ErrorKind;
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of the engine's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailStats {
    pub emails_sent: u64,
    pub emails_failed: u64,
    pub emails_validated: u64,
    pub rate_limited: u64,
    pub retries: u64,
    pub queue_size: usize,
    pub templates_loaded: usize,
    pub is_processing_queue: bool,
    pub provider: String,
}

/// Engine-level gauges that live outside the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineGauges {
    pub queue_size: usize,
    pub templates_loaded: usize,
    pub is_processing_queue: bool,
}

/// `metrics` facade emitters, labelled by provider.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    provider: String,
}

impl EngineMetrics {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    pub fn email_sent(&self, duration: Duration) {
        counter!("email_engine_sent_total", "provider" => self.provider.clone()).increment(1);
        histogram!("email_engine_delivery_duration_seconds", "provider" => self.provider.clone())
            .record(duration.as_secs_f64());
    }

    pub fn email_failed(&self, kind: ErrorKind) {
        counter!(
            "email_engine_failed_total",
            "provider" => self.provider.clone(),
            "kind" => kind.as_str()
        )
        .increment(1);
    }

    pub fn address_validated(&self, valid: bool) {
        counter!(
            "email_engine_validated_total",
            "result" => if valid { "valid" } else { "invalid" }
        )
        .increment(1);
    }

    pub fn rate_limited(&self) {
        counter!("email_engine_rate_limited_total", "provider" => self.provider.clone()).increment(1);
    }

    pub fn retry(&self) {
        counter!("email_engine_retries_total", "provider" => self.provider.clone()).increment(1);
    }

    pub fn queue_depth(&self, depth: usize) {
        gauge!("email_engine_queue_depth", "provider" => self.provider.clone()).set(depth as f64);
    }
}

/// Monotonic counters. Nothing here ever decrements.
#[derive(Debug)]
pub struct StatsCollector {
    sent: AtomicU64,
    failed: AtomicU64,
    validated: AtomicU64,
    rate_limited: AtomicU64,
    retries: AtomicU64,
    provider: String,
    metrics: EngineMetrics,
}

impl StatsCollector {
    pub fn new(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            validated: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            metrics: EngineMetrics::new(provider.clone()),
            provider,
        }
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn record_sent(&self, duration: Duration) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.metrics.email_sent(duration);
    }

    pub fn record_failed(&self, kind: ErrorKind) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.metrics.email_failed(kind);
    }

    pub fn record_validated(&self, valid: bool) {
        self.validated.fetch_add(1, Ordering::Relaxed);
        self.metrics.address_validated(valid);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        self.metrics.rate_limited();
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        self.metrics.retry();
    }

    pub fn snapshot(&self, gauges: EngineGauges) -> EmailStats {
        EmailStats {
            emails_sent: self.sent.load(Ordering::Relaxed),
            emails_failed: self.failed.load(Ordering::Relaxed),
            emails_validated: self.validated.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            queue_size: gauges.queue_size,
            templates_loaded: gauges.templates_loaded,
            is_processing_queue: gauges.is_processing_queue,
            provider: self.provider.clone(),
        }
    }
}

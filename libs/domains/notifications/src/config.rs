//! Engine, branding and runtime-override configuration.

use crate::error::{NotificationError, NotificationResult};
use crate::models::BatchMode;
use crate::providers::SimulationSettings;
use crate::rate_limit::{RateLimits, WindowPeriod};
use crate::retry::RetryPolicy;
use core_config::{
    env_duration_ms, env_flag, env_or_default, env_parse, env_parse_optional, ConfigError, FromEnv,
};
use std::time::Duration;

/// Everything `configure` can change, plus construction-time settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub send_delay: Duration,
    pub should_fail_send: bool,
    pub failure_rate: f64,
    pub daily_limit: u32,
    pub enable_rate_limit: bool,
    pub per_recipient_daily_limit: Option<u32>,
    pub enable_tracking: bool,
    /// Upper bound on retained delivery records and finished job records.
    pub tracking_capacity: usize,
    pub retry: RetryPolicy,
    pub batch_concurrency: usize,
    pub batch_mode: BatchMode,
    pub max_attachment_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::ZERO,
            should_fail_send: false,
            failure_rate: 0.0,
            daily_limit: 1000,
            enable_rate_limit: true,
            per_recipient_daily_limit: None,
            enable_tracking: true,
            tracking_capacity: 1000,
            retry: RetryPolicy::default(),
            batch_concurrency: 4,
            batch_mode: BatchMode::Send,
            max_attachment_bytes: 10 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    pub fn simulation(&self) -> SimulationSettings {
        SimulationSettings {
            send_delay: self.send_delay,
            should_fail_send: self.should_fail_send,
            failure_rate: self.failure_rate,
        }
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            enabled: self.enable_rate_limit,
            global: Some(self.daily_limit),
            per_recipient: self.per_recipient_daily_limit,
            period: WindowPeriod::Daily,
        }
    }

    /// Overlay the fields set in `options`.
    pub fn apply(&mut self, options: &ConfigureOptions) {
        if let Some(send_delay) = options.send_delay {
            self.send_delay = send_delay;
        }
        if let Some(should_fail_send) = options.should_fail_send {
            self.should_fail_send = should_fail_send;
        }
        if let Some(failure_rate) = options.failure_rate {
            self.failure_rate = failure_rate;
        }
        if let Some(daily_limit) = options.daily_limit {
            self.daily_limit = daily_limit;
        }
        if let Some(enable_rate_limit) = options.enable_rate_limit {
            self.enable_rate_limit = enable_rate_limit;
        }
        if let Some(per_recipient) = options.per_recipient_daily_limit {
            self.per_recipient_daily_limit = per_recipient;
        }
        if let Some(enable_tracking) = options.enable_tracking {
            self.enable_tracking = enable_tracking;
        }
        if let Some(max_attempts) = options.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
    }
}

impl FromEnv for EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let batch_mode = match env_or_default("EMAIL_BATCH_MODE", "send").to_ascii_lowercase().as_str() {
            "send" => BatchMode::Send,
            "queue" => BatchMode::Queue,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "EMAIL_BATCH_MODE".to_string(),
                    details: format!("'{other}' is not one of send, queue"),
                });
            }
        };

        Ok(Self {
            send_delay: env_duration_ms("EMAIL_SEND_DELAY_MS", defaults.send_delay)?,
            should_fail_send: false,
            failure_rate: 0.0,
            daily_limit: env_parse("EMAIL_DAILY_LIMIT", defaults.daily_limit)?,
            enable_rate_limit: env_flag("EMAIL_RATE_LIMIT_ENABLED", defaults.enable_rate_limit)?,
            per_recipient_daily_limit: env_parse_optional("EMAIL_PER_RECIPIENT_DAILY_LIMIT")?,
            enable_tracking: env_flag("EMAIL_TRACKING_ENABLED", defaults.enable_tracking)?,
            tracking_capacity: env_parse("EMAIL_TRACKING_CAPACITY", defaults.tracking_capacity)?,
            retry: RetryPolicy::from_env()?,
            batch_concurrency: env_parse("EMAIL_BATCH_CONCURRENCY", defaults.batch_concurrency)?.max(1),
            batch_mode,
            max_attachment_bytes: env_parse("EMAIL_MAX_ATTACHMENT_BYTES", defaults.max_attachment_bytes)?,
        })
    }
}

/// Partial update accepted by `NotificationEngine::configure`.
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigureOptions {
    pub send_delay: Option<Duration>,
    pub should_fail_send: Option<bool>,
    pub failure_rate: Option<f64>,
    pub daily_limit: Option<u32>,
    pub enable_rate_limit: Option<bool>,
    pub enable_tracking: Option<bool>,
    pub max_attempts: Option<u32>,
    /// `Some(None)` removes the per-recipient cap.
    pub per_recipient_daily_limit: Option<Option<u32>>,
}

impl ConfigureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn should_fail_send(mut self, fail: bool) -> Self {
        self.should_fail_send = Some(fail);
        self
    }

    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = Some(rate);
        self
    }

    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn enable_rate_limit(mut self, enabled: bool) -> Self {
        self.enable_rate_limit = Some(enabled);
        self
    }

    pub fn enable_tracking(mut self, enabled: bool) -> Self {
        self.enable_tracking = Some(enabled);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn per_recipient_daily_limit(mut self, limit: Option<u32>) -> Self {
        self.per_recipient_daily_limit = Some(limit);
        self
    }

    pub fn validate(&self) -> NotificationResult<()> {
        if let Some(rate) = self.failure_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(NotificationError::ConfigError(format!(
                    "failure_rate must be within [0, 1], got {rate}"
                )));
            }
        }
        if self.max_attempts == Some(0) {
            return Err(NotificationError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Links and footer details shaped into template data by the convenience senders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandingConfig {
    pub frontend_url: String,
    pub company_name: String,
    pub company_address: String,
    pub logo_url: String,
    pub verification_expiry_hours: u32,
    pub password_reset_expiry_hours: u32,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            company_name: "Acme".to_string(),
            company_address: String::new(),
            logo_url: String::new(),
            verification_expiry_hours: 24,
            password_reset_expiry_hours: 1,
        }
    }
}

impl BrandingConfig {
    /// `path` appended to the frontend URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url.trim_end_matches('/'), path)
    }
}

impl FromEnv for BrandingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            frontend_url: env_or_default("FRONTEND_URL", &defaults.frontend_url),
            company_name: env_or_default("COMPANY_NAME", &defaults.company_name),
            company_address: env_or_default("COMPANY_ADDRESS", ""),
            logo_url: env_or_default("LOGO_URL", ""),
            verification_expiry_hours: env_parse(
                "EMAIL_VERIFICATION_EXPIRY_HOURS",
                defaults.verification_expiry_hours,
            )?,
            password_reset_expiry_hours: env_parse(
                "PASSWORD_RESET_EXPIRY_HOURS",
                defaults.password_reset_expiry_hours,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut config = EngineConfig::default();
        config.apply(
            &ConfigureOptions::new()
                .daily_limit(5)
                .should_fail_send(true)
                .per_recipient_daily_limit(Some(2)),
        );

        assert_eq!(config.daily_limit, 5);
        assert!(config.should_fail_send);
        assert_eq!(config.per_recipient_daily_limit, Some(2));
        assert!(config.enable_rate_limit);
        assert!(config.enable_tracking);
        assert_eq!(config.retry.max_attempts, 3);

        config.apply(&ConfigureOptions::new().per_recipient_daily_limit(None));
        assert_eq!(config.per_recipient_daily_limit, None);
        assert_eq!(config.daily_limit, 5);
    }

    #[test]
    fn test_configure_options_validation() {
        assert!(ConfigureOptions::new().failure_rate(0.5).validate().is_ok());
        assert!(ConfigureOptions::new().failure_rate(1.5).validate().is_err());
        assert!(ConfigureOptions::new().max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = EngineConfig {
            send_delay: Duration::from_millis(20),
            failure_rate: 0.25,
            daily_limit: 7,
            per_recipient_daily_limit: Some(3),
            ..Default::default()
        };

        let limits = config.rate_limits();
        assert_eq!(limits.global, Some(7));
        assert_eq!(limits.per_recipient, Some(3));
        assert_eq!(limits.period, WindowPeriod::Daily);

        let simulation = config.simulation();
        assert_eq!(simulation.send_delay, Duration::from_millis(20));
        assert_eq!(simulation.failure_rate, 0.25);
        assert!(!simulation.should_fail_send);
    }

    #[test]
    fn test_engine_config_from_env() {
        temp_env::with_vars(
            [
                ("EMAIL_DAILY_LIMIT", Some("50")),
                ("EMAIL_RATE_LIMIT_ENABLED", Some("false")),
                ("EMAIL_PER_RECIPIENT_DAILY_LIMIT", Some("5")),
                ("EMAIL_BATCH_MODE", Some("queue")),
                ("EMAIL_BATCH_CONCURRENCY", Some("0")),
                ("EMAIL_MAX_ATTEMPTS", None),
            ],
            || {
                let config = EngineConfig::from_env().unwrap();
                assert_eq!(config.daily_limit, 50);
                assert!(!config.enable_rate_limit);
                assert_eq!(config.per_recipient_daily_limit, Some(5));
                assert_eq!(config.batch_mode, BatchMode::Queue);
                assert_eq!(config.batch_concurrency, 1);
                assert_eq!(config.retry.max_attempts, 3);
            },
        );
    }

    #[test]
    fn test_engine_config_rejects_unknown_batch_mode() {
        temp_env::with_var("EMAIL_BATCH_MODE", Some("later"), || {
            assert!(EngineConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_branding_from_env() {
        temp_env::with_vars(
            [
                ("FRONTEND_URL", Some("https://app.example.com/")),
                ("COMPANY_NAME", Some("Example")),
                ("PASSWORD_RESET_EXPIRY_HOURS", Some("2")),
            ],
            || {
                let branding = BrandingConfig::from_env().unwrap();
                assert_eq!(branding.company_name, "Example");
                assert_eq!(branding.password_reset_expiry_hours, 2);
                assert_eq!(branding.verification_expiry_hours, 24);
                assert_eq!(branding.url("/dashboard"), "https://app.example.com/dashboard");
            },
        );
    }
}

//! Fixed-window send quotas.
//!
//! Windows are keyed by scope and period and reset lazily: a window whose
//! boundary has passed is zeroed by the next admission that touches it. All
//! windows live behind one lock so a multi-scope admission is atomic.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowPeriod {
    /// Resets at the top of every hour (UTC).
    Hourly,
    /// Resets at midnight UTC.
    Daily,
}

impl WindowPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowPeriod::Hourly => "hourly",
            WindowPeriod::Daily => "daily",
        }
    }

    /// First reset boundary strictly after `now`.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            WindowPeriod::Hourly => now
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0)),
            WindowPeriod::Daily => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc()),
        }
        .unwrap_or(now);

        match self {
            WindowPeriod::Hourly => start + Duration::hours(1),
            WindowPeriod::Daily => start + Duration::days(1),
        }
    }
}

/// Who a quota applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateScope {
    Global,
    Recipient(String),
}

impl RateScope {
    pub fn recipient(address: &str) -> Self {
        RateScope::Recipient(address.trim().to_ascii_lowercase())
    }

    /// Window key, e.g. `global:daily` or `recipient:ada@example.com:daily`.
    pub fn key(&self, period: WindowPeriod) -> String {
        match self {
            RateScope::Global => format!("global:{}", period.as_str()),
            RateScope::Recipient(address) => format!("recipient:{}:{}", address, period.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    count: u32,
    limit: u32,
    resets_at: DateTime<Utc>,
}

impl RateWindow {
    fn new(limit: u32, resets_at: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            limit,
            resets_at,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn resets_at(&self) -> DateTime<Utc> {
        self.resets_at
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Limits in force. `None` means unlimited for that scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub enabled: bool,
    pub global: Option<u32>,
    pub per_recipient: Option<u32>,
    pub period: WindowPeriod,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            global: Some(1000),
            per_recipient: None,
            period: WindowPeriod::Daily,
        }
    }
}

impl RateLimits {
    fn limit_for(&self, scope: &RateScope) -> Option<u32> {
        match scope {
            RateScope::Global => self.global,
            RateScope::Recipient(_) => self.per_recipient,
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    limits: RateLimits,
    windows: HashMap<String, RateWindow>,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                limits,
                windows: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limits(&self) -> RateLimits {
        self.lock().limits
    }

    /// Replace the limits. Existing counts are kept for the current window.
    pub fn set_limits(&self, limits: RateLimits) {
        let mut state = self.lock();
        if state.limits.period != limits.period {
            state.windows.clear();
        }
        state.limits = limits;
    }

    /// Consume one unit from `scope` if it has capacity.
    pub fn admit(&self, scope: &RateScope) -> bool {
        self.admit_all(std::slice::from_ref(scope)).is_ok()
    }

    /// Consume one unit from every scope, or from none of them.
    ///
    /// Returns the first scope without capacity on refusal.
    pub fn admit_all(&self, scopes: &[RateScope]) -> Result<(), RateScope> {
        self.admit_all_at(scopes, Utc::now())
    }

    pub fn admit_all_at(&self, scopes: &[RateScope], now: DateTime<Utc>) -> Result<(), RateScope> {
        let mut state = self.lock();
        // Windows reset lazily: an expired one is dropped and recreated on demand.
        state.windows.retain(|_, window| now < window.resets_at);
        let limits = state.limits;
        if !limits.enabled {
            return Ok(());
        }

        let mut admitted = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let Some(limit) = limits.limit_for(scope) else {
                continue;
            };
            let key = scope.key(limits.period);
            let window = state
                .windows
                .entry(key.clone())
                .or_insert_with(|| RateWindow::new(limit, limits.period.next_boundary(now)));
            window.limit = limit;
            if window.count >= window.limit {
                return Err(scope.clone());
            }
            admitted.push(key);
        }

        for key in admitted {
            if let Some(window) = state.windows.get_mut(&key) {
                window.count += 1;
            }
        }
        Ok(())
    }

    /// Units left in the current window, `None` when the scope is unlimited.
    pub fn remaining(&self, scope: &RateScope) -> Option<u32> {
        self.remaining_at(scope, Utc::now())
    }

    pub fn remaining_at(&self, scope: &RateScope, now: DateTime<Utc>) -> Option<u32> {
        let state = self.lock();
        if !state.limits.enabled {
            return None;
        }
        let limit = state.limits.limit_for(scope)?;

        match state.windows.get(&scope.key(state.limits.period)) {
            Some(window) if now < window.resets_at => Some(limit.saturating_sub(window.count)),
            _ => Some(limit),
        }
    }

    pub fn window(&self, scope: &RateScope) -> Option<RateWindow> {
        let state = self.lock();
        state.windows.get(&scope.key(state.limits.period)).cloned()
    }

    /// Drop every window, restoring full capacity.
    pub fn reset(&self) {
        self.lock().windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits(global: Option<u32>, per_recipient: Option<u32>) -> RateLimits {
        RateLimits {
            enabled: true,
            global,
            per_recipient,
            period: WindowPeriod::Daily,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_boundary_is_next_midnight() {
        let boundary = WindowPeriod::Daily.next_boundary(at(13, 45));
        assert_eq!(boundary, Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_hourly_boundary_is_next_hour() {
        let boundary = WindowPeriod::Hourly.next_boundary(at(13, 45));
        assert_eq!(boundary, at(14, 0));
    }

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(limits(Some(3), None));
        let now = at(9, 0);

        for _ in 0..3 {
            assert!(limiter.admit_all_at(&[RateScope::Global], now).is_ok());
        }
        assert_eq!(limiter.admit_all_at(&[RateScope::Global], now), Err(RateScope::Global));
        assert_eq!(limiter.window(&RateScope::Global).unwrap().count(), 3);
    }

    #[test]
    fn test_lazy_reset_after_boundary() {
        let limiter = RateLimiter::new(limits(Some(1), None));
        assert!(limiter.admit_all_at(&[RateScope::Global], at(23, 59)).is_ok());
        assert!(limiter.admit_all_at(&[RateScope::Global], at(23, 59)).is_err());

        let tomorrow = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 1).unwrap();
        assert_eq!(limiter.remaining_at(&RateScope::Global, tomorrow), Some(1));
        assert!(limiter.admit_all_at(&[RateScope::Global], tomorrow).is_ok());

        let window = limiter.window(&RateScope::Global).unwrap();
        assert_eq!(window.count(), 1);
        assert_eq!(window.resets_at(), Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_expired_recipient_windows_are_dropped() {
        let limiter = RateLimiter::new(limits(Some(1000), Some(5)));
        for i in 0..50 {
            let scope = RateScope::recipient(&format!("user{i}@example.com"));
            limiter.admit_all_at(&[RateScope::Global, scope], at(12, 0)).unwrap();
        }
        assert_eq!(limiter.lock().windows.len(), 51);

        let later = Utc.with_ymd_and_hms(2025, 3, 23, 8, 0, 0).unwrap();
        let newcomer = RateScope::recipient("late@example.com");
        limiter.admit_all_at(&[RateScope::Global, newcomer.clone()], later).unwrap();

        let state = limiter.lock();
        assert_eq!(state.windows.len(), 2);
        assert!(state.windows.contains_key(&newcomer.key(WindowPeriod::Daily)));
        assert_eq!(state.windows["global:daily"].count(), 1);
    }

    #[test]
    fn test_multi_scope_is_all_or_nothing() {
        let limiter = RateLimiter::new(limits(Some(10), Some(1)));
        let ada = RateScope::recipient("Ada@Example.com");
        let now = at(10, 0);

        assert!(limiter.admit_all_at(&[RateScope::Global, ada.clone()], now).is_ok());
        assert_eq!(
            limiter.admit_all_at(&[RateScope::Global, ada.clone()], now),
            Err(ada.clone())
        );
        // The refused admission must not have consumed global capacity.
        assert_eq!(limiter.remaining_at(&RateScope::Global, now), Some(9));
    }

    #[test]
    fn test_unlimited_scope_and_disabled_limiter() {
        let limiter = RateLimiter::new(limits(None, None));
        assert!(limiter.admit(&RateScope::Global));
        assert_eq!(limiter.remaining(&RateScope::Global), None);

        let limiter = RateLimiter::new(RateLimits {
            enabled: false,
            ..limits(Some(0), None)
        });
        assert!(limiter.admit(&RateScope::Global));
    }

    #[test]
    fn test_set_limits_keeps_current_counts() {
        let limiter = RateLimiter::new(limits(Some(2), None));
        let now = at(8, 0);
        limiter.admit_all_at(&[RateScope::Global], now).unwrap();
        limiter.admit_all_at(&[RateScope::Global], now).unwrap();
        assert!(limiter.admit_all_at(&[RateScope::Global], now).is_err());

        limiter.set_limits(limits(Some(5), None));
        assert_eq!(limiter.remaining_at(&RateScope::Global, now), Some(3));
        assert!(limiter.admit_all_at(&[RateScope::Global], now).is_ok());
    }

    #[test]
    fn test_scope_keys() {
        assert_eq!(RateScope::Global.key(WindowPeriod::Daily), "global:daily");
        assert_eq!(
            RateScope::recipient(" Bob@Example.com ").key(WindowPeriod::Hourly),
            "recipient:bob@example.com:hourly"
        );
    }
}

//! Per-email lockout after repeated failed sign-ins.
//!
//! Failures count within a window of `lockout_secs` from the first one.
//! Entries whose window and lockout have both run out are pruned whenever a
//! new failure is recorded, so the table only holds recent activity.

use crate::config::AuthPolicy;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// About a century; keeps timestamp arithmetic in range.
const MAX_WINDOW_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug)]
struct Attempts {
    failures: u32,
    first_failure: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

impl Attempts {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            failures: 0,
            first_failure: now,
            locked_until: None,
        }
    }

    fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.locked_until {
            Some(until) => until <= now,
            None => self.first_failure + window <= now,
        }
    }
}

/// Tracks failed sign-in attempts per normalized email.
#[derive(Debug)]
pub struct LoginThrottle {
    policy: AuthPolicy,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl LoginThrottle {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn window(&self) -> Duration {
        let secs = i64::try_from(self.policy.lockout_secs)
            .unwrap_or(MAX_WINDOW_SECS)
            .min(MAX_WINDOW_SECS);
        Duration::try_seconds(secs).unwrap_or_default()
    }

    /// Minutes remaining on an active lockout, rounded up.
    ///
    /// An expired lockout is cleared as a side effect.
    pub fn locked_for(&self, email: &str, now: DateTime<Utc>) -> Option<i64> {
        let key = normalize(email);
        let mut attempts = self.attempts.lock();
        let until = attempts.get(&key)?.locked_until?;

        if until <= now {
            attempts.remove(&key);
            return None;
        }

        let secs = (until - now).num_seconds().max(1);
        Some((secs + 59) / 60)
    }

    /// Record a failure; the attempt that reaches the limit starts a lockout.
    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) {
        let window = self.window();
        let mut attempts = self.attempts.lock();
        attempts.retain(|_, entry| !entry.is_stale(now, window));

        let entry = attempts
            .entry(normalize(email))
            .or_insert_with(|| Attempts::new(now));
        entry.failures += 1;

        if entry.failures >= self.policy.max_failed_attempts {
            let until = now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            entry.locked_until = Some(until);
            tracing::warn!(email = %email, failures = entry.failures, "sign-in locked out");
        }
    }

    /// Drop every entry whose window and lockout have passed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let window = self.window();
        let mut attempts = self.attempts.lock();
        let before = attempts.len();
        attempts.retain(|_, entry| !entry.is_stale(now, window));
        before - attempts.len()
    }

    pub fn clear(&self, email: &str) {
        self.attempts.lock().remove(&normalize(email));
    }

    pub fn failures(&self, email: &str) -> u32 {
        self.attempts
            .lock()
            .get(&normalize(email))
            .map_or(0, |a| a.failures)
    }

    /// Emails currently tracked.
    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.lock().is_empty()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(AuthPolicy {
            max_failed_attempts: 3,
            lockout_secs: 600,
            ..AuthPolicy::default()
        })
    }

    #[test]
    fn locks_after_limit() {
        let throttle = throttle();
        let now = Utc::now();

        throttle.record_failure("a@example.com", now);
        throttle.record_failure("a@example.com", now);
        assert_eq!(throttle.locked_for("a@example.com", now), None);

        throttle.record_failure("A@Example.com", now);
        assert_eq!(throttle.locked_for("a@example.com", now), Some(10));
        assert_eq!(throttle.locked_for("b@example.com", now), None);
    }

    #[test]
    fn lockout_expires_and_resets() {
        let throttle = throttle();
        let now = Utc::now();
        for _ in 0..3 {
            throttle.record_failure("a@example.com", now);
        }

        let later = now + Duration::seconds(601);
        assert_eq!(throttle.locked_for("a@example.com", later), None);
        assert_eq!(throttle.failures("a@example.com"), 0);
    }

    #[test]
    fn minutes_round_up() {
        let throttle = throttle();
        let now = Utc::now();
        for _ in 0..3 {
            throttle.record_failure("a@example.com", now);
        }

        assert_eq!(throttle.locked_for("a@example.com", now + Duration::seconds(541)), Some(1));
    }

    #[test]
    fn failures_outside_window_start_over() {
        let throttle = throttle();
        let now = Utc::now();
        throttle.record_failure("a@example.com", now);
        throttle.record_failure("a@example.com", now);

        throttle.record_failure("a@example.com", now + Duration::seconds(601));

        assert_eq!(throttle.failures("a@example.com"), 1);
        assert_eq!(throttle.locked_for("a@example.com", now + Duration::seconds(601)), None);
    }

    #[test]
    fn stale_entries_are_pruned_on_new_failures() {
        let throttle = throttle();
        let now = Utc::now();
        for i in 0..50 {
            throttle.record_failure(&format!("spray{i}@example.com"), now);
        }
        assert_eq!(throttle.len(), 50);

        throttle.record_failure("fresh@example.com", now + Duration::seconds(601));

        assert_eq!(throttle.len(), 1);
        assert_eq!(throttle.failures("spray0@example.com"), 0);
    }

    #[test]
    fn sweep_keeps_active_lockouts() {
        let throttle = throttle();
        let now = Utc::now();
        throttle.record_failure("stale@example.com", now);
        let later = now + Duration::seconds(300);
        for _ in 0..3 {
            throttle.record_failure("locked@example.com", later);
        }

        assert_eq!(throttle.sweep(now + Duration::seconds(601)), 1);
        assert_eq!(throttle.len(), 1);
        assert_eq!(throttle.locked_for("locked@example.com", now + Duration::seconds(601)), Some(5));
    }

    #[test]
    fn clear_forgets_failures() {
        let throttle = throttle();
        throttle.record_failure("a@example.com", Utc::now());
        throttle.clear("a@example.com");

        assert_eq!(throttle.failures("a@example.com"), 0);
    }
}

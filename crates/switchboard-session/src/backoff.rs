// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect delay policy.
//!
//! `delay(n) = min(base * 2^(n-1) + uniform(0, jitter_max), cap)` for the
//! 1-indexed attempt `n`.

use std::time::Duration;

use rand::Rng;
use switchboard_config::model::SessionConfig;

/// Exponential backoff with additive jitter and a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub jitter_max: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            jitter_max: Duration::from_secs(2),
            cap: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            jitter_max: Duration::from_millis(config.backoff_jitter_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    /// Delay before reconnect attempt `attempt`, with fresh random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = millis(self.jitter_max);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.delay_with_jitter(attempt, Duration::from_millis(jitter))
    }

    /// Deterministic form of [`delay`](Self::delay). Attempt 0 is treated as 1.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let scaled = millis(self.base).saturating_mul(factor);
        let total = scaled.saturating_add(millis(jitter));
        Duration::from_millis(total.min(millis(self.cap)))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_per_attempt_without_jitter() {
        let policy = BackoffPolicy::default();
        let zero = Duration::ZERO;
        assert_eq!(policy.delay_with_jitter(1, zero), Duration::from_secs(5));
        assert_eq!(policy.delay_with_jitter(2, zero), Duration::from_secs(10));
        assert_eq!(policy.delay_with_jitter(3, zero), Duration::from_secs(20));
        assert_eq!(policy.delay_with_jitter(5, zero), Duration::from_secs(80));
    }

    #[test]
    fn capped_at_five_minutes() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_jitter(7, Duration::from_secs(2)),
            Duration::from_secs(300)
        );
        assert_eq!(
            policy.delay_with_jitter(u32::MAX, Duration::ZERO),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_jitter(0, Duration::ZERO),
            policy.delay_with_jitter(1, Duration::ZERO)
        );
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = BackoffPolicy {
            jitter_max: Duration::ZERO,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.delay(2), Duration::from_secs(10));
    }

    #[test]
    fn from_config_reads_millis() {
        let config = SessionConfig {
            backoff_base_ms: 100,
            backoff_jitter_ms: 0,
            backoff_cap_ms: 1_000,
            ..SessionConfig::default()
        };
        let policy = BackoffPolicy::from_config(&config);
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(10), Duration::from_millis(1_000));
    }

    proptest! {
        #[test]
        fn delay_stays_within_bounds(attempt in 1u32..=5) {
            let policy = BackoffPolicy::default();
            let floor = 5_000u64 * (1 << (attempt - 1));
            let d = policy.delay(attempt).as_millis() as u64;
            prop_assert!(d >= floor.min(300_000));
            prop_assert!(d <= (floor + 2_000).min(300_000));
        }

        #[test]
        fn delay_never_exceeds_cap(attempt in 1u32..200, base in 1u64..60_000, jitter in 0u64..10_000) {
            let policy = BackoffPolicy {
                base: Duration::from_millis(base),
                jitter_max: Duration::from_millis(jitter),
                cap: Duration::from_secs(300),
            };
            prop_assert!(policy.delay(attempt) <= Duration::from_secs(300));
        }

        #[test]
        fn delay_is_monotonic_in_attempt(attempt in 1u32..40) {
            let policy = BackoffPolicy::default();
            let a = policy.delay_with_jitter(attempt, Duration::ZERO);
            let b = policy.delay_with_jitter(attempt + 1, Duration::ZERO);
            prop_assert!(a <= b);
        }
    }
}

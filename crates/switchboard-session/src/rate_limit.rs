// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window send budgets, one hourly and one daily window per session.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use switchboard_config::model::RateLimitConfig;
use switchboard_core::SwitchboardError;

#[derive(Debug, Clone, Copy)]
struct Window {
    name: &'static str,
    used: u32,
    limit: u32,
    length: TimeDelta,
    reset_at: DateTime<Utc>,
}

impl Window {
    fn new(name: &'static str, limit: u32, length: TimeDelta, now: DateTime<Utc>) -> Self {
        Self {
            name,
            used: 0,
            limit,
            length,
            reset_at: now + length,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.reset_at {
            self.used = 0;
            self.reset_at = now + self.length;
        }
    }

    fn check(&self) -> Result<(), SwitchboardError> {
        if self.used >= self.limit {
            return Err(SwitchboardError::RateLimitExceeded {
                window: self.name.to_string(),
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn status(&self) -> WindowStatus {
        WindowStatus {
            used: self.used,
            limit: self.limit,
            remaining: self.limit.saturating_sub(self.used),
            reset_time: self.reset_at,
        }
    }
}

/// Usage of one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

/// Snapshot returned by the rate-limit endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub hourly: WindowStatus,
    pub daily: WindowStatus,
    /// Queue pacing in milliseconds.
    pub delay_between_messages: u64,
}

#[derive(Debug)]
struct Windows {
    hourly: Window,
    daily: Window,
}

impl Windows {
    fn roll(&mut self, now: DateTime<Utc>) {
        self.hourly.roll(now);
        self.daily.roll(now);
    }
}

/// Per-session send budget.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<Windows>,
    pacing: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, pacing: Duration) -> Self {
        Self::starting_at(config, pacing, Utc::now())
    }

    pub fn starting_at(config: &RateLimitConfig, pacing: Duration, now: DateTime<Utc>) -> Self {
        Self {
            windows: Mutex::new(Windows {
                hourly: Window::new("hourly", config.hourly_limit, TimeDelta::hours(1), now),
                daily: Window::new("daily", config.daily_limit, TimeDelta::days(1), now),
            }),
            pacing,
        }
    }

    fn windows(&self) -> std::sync::MutexGuard<'_, Windows> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fails with [`SwitchboardError::RateLimitExceeded`] when either budget is spent.
    pub fn check(&self) -> Result<(), SwitchboardError> {
        self.check_at(Utc::now())
    }

    pub fn check_at(&self, now: DateTime<Utc>) -> Result<(), SwitchboardError> {
        let mut windows = self.windows();
        windows.roll(now);
        windows.hourly.check()?;
        windows.daily.check()
    }

    /// Checks both windows and claims one slot in each under a single lock.
    ///
    /// Concurrent callers cannot overshoot a budget. Give the slot back with
    /// [`RateLimiter::release`] when the send it was taken for fails.
    pub fn try_acquire(&self) -> Result<(), SwitchboardError> {
        self.try_acquire_at(Utc::now())
    }

    pub fn try_acquire_at(&self, now: DateTime<Utc>) -> Result<(), SwitchboardError> {
        let mut windows = self.windows();
        windows.roll(now);
        windows.hourly.check()?;
        windows.daily.check()?;
        windows.hourly.used += 1;
        windows.daily.used += 1;
        Ok(())
    }

    /// Returns a slot taken by [`RateLimiter::try_acquire`].
    pub fn release(&self) {
        self.release_at(Utc::now());
    }

    pub fn release_at(&self, now: DateTime<Utc>) {
        let mut windows = self.windows();
        windows.roll(now);
        windows.hourly.used = windows.hourly.used.saturating_sub(1);
        windows.daily.used = windows.daily.used.saturating_sub(1);
    }

    pub fn status(&self) -> RateLimitStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> RateLimitStatus {
        let mut windows = self.windows();
        windows.roll(now);
        RateLimitStatus {
            hourly: windows.hourly.status(),
            daily: windows.daily.status(),
            delay_between_messages: u64::try_from(self.pacing.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(hourly: u32, daily: u32, now: DateTime<Utc>) -> RateLimiter {
        let config = RateLimitConfig {
            hourly_limit: hourly,
            daily_limit: daily,
        };
        RateLimiter::starting_at(&config, Duration::from_secs(1), now)
    }

    #[test]
    fn hourly_budget_blocks_then_resets() {
        let t0 = Utc::now();
        let rl = limiter(2, 10, t0);
        rl.try_acquire_at(t0).unwrap();
        rl.try_acquire_at(t0).unwrap();

        let err = rl.check_at(t0).unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::RateLimitExceeded { ref window, limit: 2 } if window == "hourly"
        ));

        let later = t0 + TimeDelta::minutes(61);
        assert!(rl.check_at(later).is_ok());
        assert_eq!(rl.status_at(later).hourly.used, 0);
        assert_eq!(rl.status_at(later).daily.used, 2);
    }

    #[test]
    fn daily_budget_outlives_hourly_reset() {
        let t0 = Utc::now();
        let rl = limiter(5, 5, t0);
        for _ in 0..5 {
            rl.try_acquire_at(t0).unwrap();
        }
        let next_hour = t0 + TimeDelta::hours(2);
        let err = rl.check_at(next_hour).unwrap_err();
        assert!(matches!(err, SwitchboardError::RateLimitExceeded { ref window, .. } if window == "daily"));
        assert!(rl.check_at(t0 + TimeDelta::days(1)).is_ok());
    }

    #[test]
    fn acquire_claims_slot_and_stops_at_limit() {
        let t0 = Utc::now();
        let rl = limiter(1, 10, t0);

        assert!(rl.try_acquire_at(t0).is_ok());
        let err = rl.try_acquire_at(t0).unwrap_err();
        assert!(matches!(err, SwitchboardError::RateLimitExceeded { ref window, limit: 1 } if window == "hourly"));
        // A refused acquire leaves the counters alone.
        assert_eq!(rl.status_at(t0).hourly.used, 1);
        assert_eq!(rl.status_at(t0).daily.used, 1);
    }

    #[test]
    fn release_returns_slot_for_failed_send() {
        let t0 = Utc::now();
        let rl = limiter(1, 10, t0);

        rl.try_acquire_at(t0).unwrap();
        rl.release_at(t0);
        assert_eq!(rl.status_at(t0).hourly.remaining, 1);
        assert!(rl.try_acquire_at(t0).is_ok());

        rl.release_at(t0);
        rl.release_at(t0);
        assert_eq!(rl.status_at(t0).daily.used, 0);
    }

    #[test]
    fn concurrent_acquires_never_overshoot() {
        let t0 = Utc::now();
        let rl = std::sync::Arc::new(limiter(3, 100, t0));
        let granted: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    let rl = rl.clone();
                    scope.spawn(move || rl.try_acquire_at(t0).is_ok())
                })
                .collect();
            workers
                .into_iter()
                .map(|w| usize::from(w.join().unwrap()))
                .sum()
        });
        assert_eq!(granted, 3);
        assert_eq!(rl.status_at(t0).hourly.used, 3);
    }

    #[test]
    fn status_serializes_camel_case() {
        let t0 = Utc::now();
        let rl = limiter(200, 1000, t0);
        rl.try_acquire_at(t0).unwrap();

        let json = serde_json::to_value(rl.status_at(t0)).unwrap();
        assert_eq!(json["hourly"]["used"], 1);
        assert_eq!(json["hourly"]["remaining"], 199);
        assert_eq!(json["daily"]["limit"], 1000);
        assert!(json["daily"]["resetTime"].is_string());
        assert_eq!(json["delayBetweenMessages"], 1000);
    }
}

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Exponential backoff with a ceiling.
///
/// The delay after the n-th consecutive failure is `base * 2^(n-1)`, capped at
/// `max`. The curve is strictly increasing until it reaches the cap and flat
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(120),
            max: Duration::from_secs(7200),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay to wait after `attempts` consecutive failures.
    ///
    /// `attempts == 0` yields a zero delay.
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempts - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max)
    }
}

/// Fetch eligibility of one feed.
///
/// `Eligible` carries no attempt count, deadline or error, so a feed can
/// never be in backoff and reset at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetryState {
    #[default]
    Eligible,
    Backoff {
        attempts: u32,
        until: DateTime<Utc>,
        last_error: String,
    },
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryState::Eligible => 0,
            RetryState::Backoff { attempts, .. } => *attempts,
        }
    }

    pub fn next_eligible_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RetryState::Eligible => None,
            RetryState::Backoff { until, .. } => Some(*until),
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            RetryState::Eligible => None,
            RetryState::Backoff { last_error, .. } => Some(last_error),
        }
    }

    /// True when the feed has no failures or its backoff deadline has passed.
    pub fn should_attempt(&self, now: DateTime<Utc>) -> bool {
        match self {
            RetryState::Eligible => true,
            RetryState::Backoff { until, .. } => now >= *until,
        }
    }

    /// A successful fetch clears all failure bookkeeping.
    pub fn on_success(&self) -> RetryState {
        RetryState::Eligible
    }

    pub fn on_failure(
        &self,
        now: DateTime<Utc>,
        error: impl Into<String>,
        policy: &BackoffPolicy,
    ) -> RetryState {
        let attempts = self.attempts().saturating_add(1);
        let delay = chrono::Duration::from_std(policy.delay(attempts))
            .unwrap_or(chrono::Duration::MAX);
        let until = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        RetryState::Backoff {
            attempts,
            until,
            last_error: error.into(),
        }
    }
}

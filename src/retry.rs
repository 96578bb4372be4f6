//! Retry scheduling for failed enrichment attempts.
//!
//! A work item that fails summarization is not retried on the next scan.
//! Each failure bumps a retry counter and stamps the attempt time; the item
//! becomes eligible again only once the delay for its counter has elapsed.
//! Items older than the policy's maximum age are retired for good.
//!
//! ```text
//! NeverAttempted ──fail──▶ Failed(1, t) ──fail──▶ Failed(2, t') ──▶ ...
//!                              │
//!                              ├──success──▶ Succeeded
//!                              └──age > max_age──▶ Retired
//! ```
//!
//! Two backoff tables have been run in production: 1h/6h/12h with a one-day
//! age cutoff, and 1h/6h/24h/7d without one. Both are available as presets;
//! the decision logic takes whichever the caller configures.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What happens once the retry counter runs past the last backoff tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterLastTier {
    /// The item is never retried again.
    #[default]
    Stop,
    /// Keep retrying, waiting the last tier's delay each time.
    RepeatLast,
}

/// Escalating delays keyed by retry count. Count 1 maps to the first tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    tiers: Vec<TimeDelta>,
    after_last_tier: AfterLastTier,
}

impl BackoffSchedule {
    pub fn new(tiers: Vec<TimeDelta>, after_last_tier: AfterLastTier) -> Self {
        Self {
            tiers,
            after_last_tier,
        }
    }

    pub fn tiers(&self) -> &[TimeDelta] {
        &self.tiers
    }

    pub fn after_last_tier(&self) -> AfterLastTier {
        self.after_last_tier
    }

    /// Minimum wait after the most recent failure before attempt number
    /// `retry_count + 1`. `None` means no further attempts.
    ///
    /// A count of zero (a failed item whose counter was reset) has no delay.
    pub fn delay_for(&self, retry_count: u32) -> Option<TimeDelta> {
        if retry_count == 0 {
            return Some(TimeDelta::zero());
        }
        match self.tiers.get((retry_count - 1) as usize) {
            Some(delay) => Some(*delay),
            None => match self.after_last_tier {
                AfterLastTier::Stop => None,
                AfterLastTier::RepeatLast => self.tiers.last().copied(),
            },
        }
    }
}

/// Backoff schedule plus the age cutoff past which failed items retire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub schedule: BackoffSchedule,
    pub max_age: Option<TimeDelta>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::three_tier()
    }
}

impl RetryPolicy {
    /// 1h, 6h, 12h; failed items older than one day retire.
    pub fn three_tier() -> Self {
        Self {
            schedule: BackoffSchedule::new(
                vec![TimeDelta::hours(1), TimeDelta::hours(6), TimeDelta::hours(12)],
                AfterLastTier::Stop,
            ),
            max_age: Some(TimeDelta::days(1)),
        }
    }

    /// 1h, 6h, 24h, 7d; no age cutoff.
    pub fn four_tier() -> Self {
        Self {
            schedule: BackoffSchedule::new(
                vec![
                    TimeDelta::hours(1),
                    TimeDelta::hours(6),
                    TimeDelta::hours(24),
                    TimeDelta::days(7),
                ],
                AfterLastTier::Stop,
            ),
            max_age: None,
        }
    }

    /// Strictly older than the cutoff.
    pub fn is_retired(&self, item_age: TimeDelta) -> bool {
        self.max_age.is_some_and(|max| item_age > max)
    }
}

/// Scheduler view of a work item's retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NeverAttempted,
    Failed {
        retry_count: u32,
        last_attempt_at: Option<DateTime<Utc>>,
    },
    Succeeded,
    Retired,
}

/// Persisted retry fields of a work item.
///
/// `retry_count` only grows while `failed` is set; success clears both the
/// counter and the timestamp together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub failed: bool,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub succeeded: bool,
}

impl RetryState {
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failed = true;
        self.succeeded = false;
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_at = Some(now);
    }

    pub fn record_success(&mut self) {
        *self = RetryState {
            succeeded: true,
            ..RetryState::default()
        };
    }

    /// Daily reset: failed items get a fresh counter but stay failed.
    pub fn reset_counter(&mut self) {
        if self.failed {
            self.retry_count = 0;
            self.last_attempt_at = None;
        }
    }

    pub fn phase(&self, item_age: TimeDelta, policy: &RetryPolicy) -> Phase {
        if self.succeeded {
            return Phase::Succeeded;
        }
        if !self.failed && self.retry_count == 0 {
            return Phase::NeverAttempted;
        }
        if policy.is_retired(item_age) {
            return Phase::Retired;
        }
        Phase::Failed {
            retry_count: self.retry_count,
            last_attempt_at: self.last_attempt_at,
        }
    }

    pub fn is_eligible(&self, item_age: TimeDelta, now: DateTime<Utc>, policy: &RetryPolicy) -> bool {
        is_eligible(self.phase(item_age, policy), now, policy)
    }
}

/// Whether an item in `phase` may be attempted at `now`.
pub fn is_eligible(phase: Phase, now: DateTime<Utc>, policy: &RetryPolicy) -> bool {
    match phase {
        Phase::NeverAttempted => true,
        Phase::Succeeded | Phase::Retired => false,
        Phase::Failed {
            retry_count,
            last_attempt_at,
        } => match policy.schedule.delay_for(retry_count) {
            None => false,
            Some(delay) => match last_attempt_at {
                Some(at) => now.signed_duration_since(at) > delay,
                None => true,
            },
        },
    }
}

/// Eligibility from raw persisted columns.
///
/// A zero counter with no timestamp is an item that was never attempted and
/// is always eligible; anything else is a failed item subject to the age
/// cutoff and the backoff schedule.
pub fn is_retry_eligible(
    retry_count: u32,
    last_attempt_at: Option<DateTime<Utc>>,
    item_age: TimeDelta,
    now: DateTime<Utc>,
    policy: &RetryPolicy,
) -> bool {
    let state = RetryState {
        failed: retry_count > 0 || last_attempt_at.is_some(),
        retry_count,
        last_attempt_at,
        succeeded: false,
    };
    state.is_eligible(item_age, now, policy)
}

//! Stall classification.
//!
//! Maps one queue entry and its ledger record onto a [`Verdict`]. The
//! decision is pure: the caller supplies `now` and applies the verdict.
//!
//! An entry is only discarded once its degraded condition has persisted for
//! longer than the catch-up window, measured from the last run that saw it
//! healthy. Any single healthy sample resets the clock, so a transient blip
//! in the upstream estimate never discards a download on its own.

use std::time::Duration;

use chrono::TimeDelta;
use discarr_model::{LedgerTimestamp, TimeLeft};

/// Thresholds for one swept service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallPolicy {
    /// Reported time-remaining above this counts as stalled.
    pub max_allowed_download_time: Duration,
    /// How long an entry may stay stalled before it is discarded.
    pub max_allowed_catchup_time: Duration,
}

impl StallPolicy {
    pub fn new(
        max_allowed_download_time: Duration,
        max_allowed_catchup_time: Duration,
    ) -> Self {
        Self {
            max_allowed_download_time,
            max_allowed_catchup_time,
        }
    }

    /// Policy for sources whose entries are always [`TimeLeft::Stalled`],
    /// where only the grace window matters.
    pub fn grace_only(window: Duration) -> Self {
        Self::new(Duration::ZERO, window)
    }

    fn catchup_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.max_allowed_catchup_time)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(4 * 3600), Duration::from_secs(10 * 60))
    }
}

/// Outcome of classifying one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Record `now` as the entry's last healthy moment.
    Refresh,
    /// Stalled but still inside the catch-up window; leave the ledger alone.
    Wait { elapsed: TimeDelta },
    /// Stalled for longer than the catch-up window.
    Discard { elapsed: TimeDelta },
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Refresh => "refresh",
            Verdict::Wait { .. } => "wait",
            Verdict::Discard { .. } => "discard",
        }
    }
}

/// Whether a time-remaining signal counts as stalled under `policy`.
///
/// A reported zero is stalled, not "almost done": the upstream services
/// report `00:00:00` for downloads that have stopped moving.
pub fn is_stalled(time_left: &TimeLeft, policy: &StallPolicy) -> bool {
    match time_left {
        TimeLeft::Unknown | TimeLeft::Stalled => true,
        TimeLeft::Known(remaining) => {
            remaining.is_zero() || *remaining > policy.max_allowed_download_time
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StallClassifier {
    policy: StallPolicy,
}

impl StallClassifier {
    pub fn new(policy: StallPolicy) -> Self {
        Self { policy }
    }

    /// Classify one entry.
    ///
    /// `last_healthy_at` is `None` for an id the ledger has never seen; such
    /// an entry is always refreshed without looking at its signal.
    pub fn classify(
        &self,
        time_left: &TimeLeft,
        last_healthy_at: Option<LedgerTimestamp>,
        now: LedgerTimestamp,
    ) -> Verdict {
        let Some(last_healthy_at) = last_healthy_at else {
            return Verdict::Refresh;
        };

        if !is_stalled(time_left, &self.policy) {
            return Verdict::Refresh;
        }

        let elapsed = last_healthy_at.elapsed_until(now);
        if elapsed > self.policy.catchup_delta() {
            Verdict::Discard { elapsed }
        } else {
            Verdict::Wait { elapsed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HOUR: Duration = Duration::from_secs(3600);
    const MINUTE: Duration = Duration::from_secs(60);

    fn t0() -> LedgerTimestamp {
        LedgerTimestamp::from_naive(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn at(minutes: i64) -> LedgerTimestamp {
        t0().checked_add(TimeDelta::minutes(minutes)).unwrap()
    }

    fn classifier() -> StallClassifier {
        StallClassifier::new(StallPolicy::new(2 * HOUR, 5 * MINUTE))
    }

    #[test]
    fn newly_observed_is_refreshed_even_when_stalled() {
        let verdict = classifier().classify(&TimeLeft::Unknown, None, t0());
        assert_eq!(verdict, Verdict::Refresh);
    }

    #[test]
    fn healthy_estimate_refreshes() {
        let verdict = classifier().classify(
            &TimeLeft::Known(HOUR),
            Some(t0()),
            at(30),
        );
        assert_eq!(verdict, Verdict::Refresh);
    }

    #[test]
    fn zero_remaining_is_stalled() {
        let policy = StallPolicy::new(2 * HOUR, 5 * MINUTE);
        assert!(is_stalled(&TimeLeft::Known(Duration::ZERO), &policy));
        let verdict = classifier().classify(
            &TimeLeft::Known(Duration::ZERO),
            Some(t0()),
            at(1),
        );
        assert!(matches!(verdict, Verdict::Wait { .. }));
    }

    #[test]
    fn unknown_and_stalled_signals_are_stalled() {
        let policy = StallPolicy::default();
        assert!(is_stalled(&TimeLeft::Unknown, &policy));
        assert!(is_stalled(&TimeLeft::Stalled, &policy));
    }

    #[test]
    fn threshold_itself_is_not_stalled() {
        let policy = StallPolicy::new(2 * HOUR, 5 * MINUTE);
        assert!(!is_stalled(&TimeLeft::Known(2 * HOUR), &policy));
        assert!(is_stalled(
            &TimeLeft::Known(2 * HOUR + Duration::from_secs(1)),
            &policy
        ));
    }

    #[test]
    fn waits_inside_catchup_window() {
        let verdict = classifier().classify(
            &TimeLeft::Known(3 * HOUR),
            Some(t0()),
            at(1),
        );
        assert_eq!(
            verdict,
            Verdict::Wait {
                elapsed: TimeDelta::minutes(1)
            }
        );
    }

    #[test]
    fn exactly_the_window_still_waits() {
        let verdict = classifier().classify(
            &TimeLeft::Known(3 * HOUR),
            Some(t0()),
            at(5),
        );
        assert!(matches!(verdict, Verdict::Wait { .. }));
    }

    #[test]
    fn discards_after_catchup_window() {
        let verdict = classifier().classify(
            &TimeLeft::Known(3 * HOUR),
            Some(t0()),
            at(6),
        );
        assert_eq!(
            verdict,
            Verdict::Discard {
                elapsed: TimeDelta::minutes(6)
            }
        );
    }

    #[test]
    fn clock_going_backwards_waits() {
        let verdict =
            classifier().classify(&TimeLeft::Unknown, Some(at(10)), t0());
        assert!(matches!(
            verdict,
            Verdict::Wait { elapsed } if elapsed < TimeDelta::zero()
        ));
    }

    #[test]
    fn grace_only_policy_treats_every_estimate_as_stalled() {
        let policy = StallPolicy::grace_only(MINUTE);
        assert!(is_stalled(&TimeLeft::Known(MINUTE), &policy));
        assert!(is_stalled(&TimeLeft::Stalled, &policy));
    }
}

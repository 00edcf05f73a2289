//! Scheduling conflict detection
//!
//! Each instance runs at most one job per conflict window: no other job for
//! the same instance may be requested within `timeout` seconds either side of
//! an already scheduled start time.

use crate::error::PersistenceResult;
use crate::persistence::Storage;
use crate::time::format_timestamp;
use crate::types::ScheduledJob;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How far from "now" a job may be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    pub past_tolerance_secs: i64,
    pub future_horizon_days: i64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            past_tolerance_secs: 5 * 60,
            future_horizon_days: 14,
        }
    }
}

impl SchedulingPolicy {
    pub fn earliest_allowed(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        shift_back(now, TimeDelta::try_seconds(self.past_tolerance_secs))
    }

    pub fn latest_allowed(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        shift_forward(now, TimeDelta::try_days(self.future_horizon_days))
    }

    /// Reject start times outside `[now - tolerance, now + horizon]`
    pub fn check_bounds(
        &self,
        now: DateTime<Utc>,
        requested: DateTime<Utc>,
    ) -> Option<ScheduleDecision> {
        let earliest = self.earliest_allowed(now);
        if requested < earliest {
            return Some(ScheduleDecision::rejected(format!(
                "job_requested_start_time is invalid. Jobs can be scheduled after {}",
                format_timestamp(&earliest)
            )));
        }

        let latest = self.latest_allowed(now);
        if requested > latest {
            return Some(ScheduleDecision::rejected(format!(
                "job_requested_start_time is invalid. Jobs can be scheduled upto {}",
                format_timestamp(&latest)
            )));
        }

        None
    }
}

/// Move `time` back by `delta`, clamping at the earliest representable time
fn shift_back(time: DateTime<Utc>, delta: Option<TimeDelta>) -> DateTime<Utc> {
    delta
        .and_then(|delta| time.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Move `time` forward by `delta`, clamping at the latest representable time
fn shift_forward(time: DateTime<Utc>, delta: Option<TimeDelta>) -> DateTime<Utc> {
    delta
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Inclusive conflict window around a requested start time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictWindow {
    pub lower: DateTime<Utc>,
    pub upper: DateTime<Utc>,
}

impl ConflictWindow {
    /// A negative timeout collapses to the requested instant
    pub fn around(requested: DateTime<Utc>, timeout_secs: i64) -> Self {
        let timeout = TimeDelta::try_seconds(timeout_secs.max(0));
        Self {
            lower: shift_back(requested, timeout),
            upper: shift_forward(requested, timeout),
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.lower <= time && time <= self.upper
    }
}

/// Outcome of the scheduling check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub valid: bool,
    pub message: String,
}

impl ScheduleDecision {
    fn accepted() -> Self {
        Self {
            valid: true,
            message: "job_requested_start_time validation is success.".to_string(),
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            valid: false,
            message,
        }
    }
}

/// Decide whether `requested` is schedulable on `instance`, given the jobs
/// already scheduled on it. Jobs for other instances or outside the
/// conflict window are ignored.
pub fn check_schedule(
    policy: &SchedulingPolicy,
    now: DateTime<Utc>,
    requested: DateTime<Utc>,
    instance: &str,
    timeout_secs: i64,
    existing: &[ScheduledJob],
) -> ScheduleDecision {
    if let Some(rejection) = policy.check_bounds(now, requested) {
        return rejection;
    }

    let window = ConflictWindow::around(requested, timeout_secs);
    let latest_conflict = existing
        .iter()
        .filter(|job| job.instance == instance && window.contains(job.job_requested_start_time))
        .map(|job| job.job_requested_start_time)
        .max();

    match latest_conflict {
        None => ScheduleDecision::accepted(),
        Some(latest) => ScheduleDecision::rejected(format!(
            "job cannot be scheduled at {}. Jobs can be scheduled after {}",
            format_timestamp(&requested),
            format_timestamp(&shift_forward(latest, TimeDelta::try_seconds(timeout_secs.max(0))))
        )),
    }
}

/// Run the scheduling check, querying storage only when the requested time
/// is within the policy bounds.
pub async fn evaluate_schedule(
    storage: &dyn Storage,
    policy: &SchedulingPolicy,
    now: DateTime<Utc>,
    requested: DateTime<Utc>,
    instance: &str,
    timeout_secs: i64,
) -> PersistenceResult<ScheduleDecision> {
    debug!(requested = %format_timestamp(&requested), timeout_secs, "checking schedule");

    if let Some(rejection) = policy.check_bounds(now, requested) {
        info!(instance, message = %rejection.message, "start time out of bounds");
        return Ok(rejection);
    }

    let window = ConflictWindow::around(requested, timeout_secs);
    let existing = storage
        .jobs_in_window(instance, window.lower, window.upper)
        .await?;

    let decision = check_schedule(policy, now, requested, instance, timeout_secs, &existing);
    info!(instance, valid = decision.valid, message = %decision.message, "schedule decision");
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobState;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn job(instance: &str, at: DateTime<Utc>) -> ScheduledJob {
        ScheduledJob {
            job_id: "1e9eb16b-d416-11eb-9168-058375ca72aa".to_string(),
            instance: instance.to_string(),
            job_requested_start_time: at,
            job_state: JobState::Queued,
        }
    }

    fn check(requested: DateTime<Utc>, existing: &[ScheduledJob]) -> ScheduleDecision {
        check_schedule(&SchedulingPolicy::default(), now(), requested, "zach", 300, existing)
    }

    #[test]
    fn test_now_is_schedulable() {
        assert!(check(now(), &[]).valid);
    }

    #[test]
    fn test_past_tolerance() {
        assert!(check(now() - Duration::minutes(5), &[]).valid);

        let decision = check(now() - Duration::minutes(5) - Duration::seconds(1), &[]);
        assert!(!decision.valid);
        assert_eq!(
            decision.message,
            "job_requested_start_time is invalid. Jobs can be scheduled after 2024-03-10T11:55:00Z"
        );
    }

    #[test]
    fn test_future_horizon() {
        assert!(check(now() + Duration::days(14), &[]).valid);

        let decision = check(now() + Duration::days(14) + Duration::seconds(1), &[]);
        assert!(!decision.valid);
        assert_eq!(
            decision.message,
            "job_requested_start_time is invalid. Jobs can be scheduled upto 2024-03-24T12:00:00Z"
        );
    }

    #[test]
    fn test_conflict_names_next_free_time() {
        let t = now() + Duration::hours(1);
        let decision = check(t, &[job("zach", t)]);
        assert!(!decision.valid);
        assert_eq!(
            decision.message,
            "job cannot be scheduled at 2024-03-10T13:00:00Z. Jobs can be scheduled after 2024-03-10T13:05:00Z"
        );
    }

    #[test]
    fn test_window_is_inclusive() {
        let t = now() + Duration::hours(1);
        assert!(!check(t + Duration::seconds(300), &[job("zach", t)]).valid);
        assert!(!check(t - Duration::seconds(300), &[job("zach", t)]).valid);
        assert!(check(t + Duration::seconds(301), &[job("zach", t)]).valid);
        assert!(check(t - Duration::seconds(301), &[job("zach", t)]).valid);
    }

    #[test]
    fn test_latest_conflict_wins() {
        let t = now() + Duration::hours(1);
        let existing = vec![job("zach", t - Duration::seconds(100)), job("zach", t + Duration::seconds(200))];
        let decision = check(t, &existing);
        assert!(decision.message.ends_with("2024-03-10T13:08:20Z"));
    }

    #[test]
    fn test_other_instances_do_not_conflict() {
        let t = now() + Duration::hours(1);
        assert!(check(t, &[job("zac", t)]).valid);
    }

    #[test]
    fn test_custom_policy() {
        let policy = SchedulingPolicy {
            past_tolerance_secs: 0,
            future_horizon_days: 1,
        };
        assert!(policy.check_bounds(now(), now() - Duration::seconds(1)).is_some());
        assert!(policy.check_bounds(now(), now() + Duration::days(2)).is_some());
        assert!(policy.check_bounds(now(), now() + Duration::hours(23)).is_none());
    }

    #[test]
    fn test_oversized_timeout_saturates() {
        let t = now() + Duration::hours(1);
        let window = ConflictWindow::around(t, i64::MAX);
        assert_eq!(window.lower, DateTime::<Utc>::MIN_UTC);
        assert_eq!(window.upper, DateTime::<Utc>::MAX_UTC);

        let decision = check_schedule(&SchedulingPolicy::default(), now(), t, "zach", i64::MAX, &[job("zach", t)]);
        assert!(!decision.valid);
    }

    #[test]
    fn test_negative_timeout_keeps_exact_conflicts() {
        let t = now() + Duration::hours(1);
        let window = ConflictWindow::around(t, -300);
        assert_eq!(window.lower, t);
        assert_eq!(window.upper, t);
        assert!(!check_schedule(&SchedulingPolicy::default(), now(), t, "zach", -300, &[job("zach", t)]).valid);
    }

    #[test]
    fn test_extreme_policy_does_not_overflow() {
        let policy = SchedulingPolicy {
            past_tolerance_secs: i64::MAX,
            future_horizon_days: i64::MAX,
        };
        assert_eq!(policy.earliest_allowed(now()), DateTime::<Utc>::MIN_UTC);
        assert_eq!(policy.latest_allowed(now()), DateTime::<Utc>::MAX_UTC);
        assert!(policy.check_bounds(now(), now() + Duration::days(365)).is_none());
    }
}

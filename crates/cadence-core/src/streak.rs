//! Streak calculation from a completion history.
//!
//! [`recompute_from_history`] is the canonical derivation. The state machine
//! maintains `streak` incrementally on complete/skip and must agree with it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{CompletionHistory, Habit};

/// Derived streak fields of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakSummary {
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
}

/// Walk the active days in date order and return the run that ends at the
/// most recent active day. Missing days and `incomplete` entries break a run.
pub fn recompute_from_history(history: &CompletionHistory) -> StreakSummary {
    let dates = history.active_dates();
    let Some(&last) = dates.last() else {
        return StreakSummary::default();
    };

    let mut streak = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for date in dates {
        streak = match previous {
            Some(prev) if date - prev == Duration::days(1) => streak + 1,
            _ => 1,
        };
        previous = Some(date);
    }

    StreakSummary {
        streak,
        last_completed: Some(last),
    }
}

/// Longest run of consecutive active days anywhere in the history.
pub fn longest_run(history: &CompletionHistory) -> u32 {
    let mut best = 0u32;
    let mut current = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for date in history.active_dates() {
        current = match previous {
            Some(prev) if date - prev == Duration::days(1) => current + 1,
            _ => 1,
        };
        best = best.max(current);
        previous = Some(date);
    }
    best
}

/// Does the incrementally maintained streak match the canonical one?
pub fn is_consistent(habit: &Habit) -> bool {
    let summary = recompute_from_history(&habit.completion_history);
    summary.streak == habit.streak && summary.last_completed == habit.last_completed
}

/// Overwrite the cached streak fields with the canonical values.
pub fn apply(habit: &mut Habit) -> StreakSummary {
    let summary = recompute_from_history(&habit.completion_history);
    habit.streak = summary.streak;
    habit.last_completed = summary.last_completed;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionEntry, CompletionStatus};
    use chrono::{TimeZone, Utc};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn history(days: &[(u32, CompletionStatus)]) -> CompletionHistory {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        days.iter()
            .map(|(day, status)| CompletionEntry::new(d(*day), *status, at))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_empty_history() {
        let summary = recompute_from_history(&CompletionHistory::new());
        assert_eq!(summary.streak, 0);
        assert_eq!(summary.last_completed, None);
    }

    #[test]
    fn test_consecutive_run() {
        use CompletionStatus::*;
        let h = history(&[(1, Completed), (2, Skipped), (3, Completed)]);
        let summary = recompute_from_history(&h);
        assert_eq!(summary.streak, 3);
        assert_eq!(summary.last_completed, Some(d(3)));
    }

    #[test]
    fn test_gap_breaks_run() {
        use CompletionStatus::*;
        let h = history(&[(1, Completed), (2, Completed), (4, Completed)]);
        let summary = recompute_from_history(&h);
        assert_eq!(summary.streak, 1);
        assert_eq!(summary.last_completed, Some(d(4)));
    }

    #[test]
    fn test_incomplete_breaks_run() {
        use CompletionStatus::*;
        let h = history(&[(1, Completed), (2, Incomplete), (3, Completed)]);
        assert_eq!(recompute_from_history(&h).streak, 1);
    }

    #[test]
    fn test_trailing_incomplete_ignored_for_last_completed() {
        use CompletionStatus::*;
        let h = history(&[(1, Completed), (2, Completed), (3, Incomplete)]);
        let summary = recompute_from_history(&h);
        assert_eq!(summary.streak, 2);
        assert_eq!(summary.last_completed, Some(d(2)));
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        use CompletionStatus::*;
        let h = history(&[(3, Completed), (1, Completed), (2, Skipped)]);
        assert_eq!(recompute_from_history(&h).streak, 3);
    }

    #[test]
    fn test_only_incomplete() {
        let h = history(&[(1, CompletionStatus::Incomplete)]);
        assert_eq!(recompute_from_history(&h), StreakSummary::default());
    }

    #[test]
    fn test_longest_run() {
        use CompletionStatus::*;
        let h = history(&[
            (1, Completed),
            (2, Completed),
            (3, Completed),
            (5, Completed),
            (6, Skipped),
        ]);
        assert_eq!(longest_run(&h), 3);
        assert_eq!(recompute_from_history(&h).streak, 2);
    }

    #[test]
    fn test_apply_and_consistency() {
        use CompletionStatus::*;
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut habit = Habit::new("u".into(), "Read".into(), now);
        habit.completion_history = history(&[(1, Completed), (2, Completed)]);
        assert!(!is_consistent(&habit));
        let summary = apply(&mut habit);
        assert_eq!(summary.streak, 2);
        assert!(is_consistent(&habit));
    }
}

//! Habit state machine: the timer (`idle` / `in-progress`) and the
//! once-per-day completion and skip rules.
//!
//! Every transition takes the current instant explicitly so the rules stay
//! pure. Persistence and the "one in-progress habit per user" lookup belong
//! to the service layer.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{calendar_day, week_start};
use crate::error::{CadenceError, Conflict, Result};
use crate::model::{
    normalize_reflection, validate_duration, CompletionEntry, Habit, HabitStatus,
    MAX_COMPLETION_DURATION_SECS,
};
use crate::patterns::{self, CompletionContext, PatternFlag};
use crate::streak;

/// Result of a successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub date: NaiveDate,
    pub streak: u32,
    pub duration: Option<u64>,
    /// Advisory only.
    pub flags: Vec<PatternFlag>,
}

impl Habit {
    /// Start the timer. `other_in_progress` is the id of any habit of the same
    /// owner that is currently running.
    pub fn start(&mut self, now: DateTime<Utc>, other_in_progress: Option<Uuid>) -> Result<()> {
        if self.is_in_progress() {
            return Err(Conflict::AlreadyRunning.into());
        }
        if let Some(habit_id) = other_in_progress.filter(|id| *id != self.id) {
            return Err(Conflict::AlreadyInProgress { habit_id }.into());
        }
        self.status = HabitStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Stop the timer and bank the elapsed seconds. Returns the seconds added,
    /// or `None` when the habit was already idle.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<u64> {
        if !self.is_in_progress() {
            tracing::debug!(habit_id = %self.id, "pause on idle habit, ignoring");
            return None;
        }
        let elapsed = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.paused_duration += elapsed;
        self.status = HabitStatus::Idle;
        self.started_at = None;
        self.updated_at = now;
        Some(elapsed)
    }

    /// Record today as completed. When `duration` is `None` the tracked timer
    /// time is used, if any.
    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        duration: Option<u64>,
        reflection: Option<&str>,
    ) -> Result<CompletionOutcome> {
        let today = calendar_day(now);
        if self.completion_history.find_entry_for_date(today).is_some() {
            return Err(Conflict::DuplicateEntry { date: today }.into());
        }
        let reflection = normalize_reflection(reflection)?;
        validate_duration(duration)?;

        // A timer left running overnight is capped rather than rejected.
        let tracked = self.tracked_seconds(now).min(MAX_COMPLETION_DURATION_SECS);
        let duration = duration.or((tracked > 0).then_some(tracked));
        let ctx = CompletionContext {
            was_idle: !self.is_in_progress(),
            timer_used: self.timer_used(),
            duration,
            minimum_duration_secs: u64::from(self.minimum_duration) * 60,
        };

        let entry = CompletionEntry::completed(today, now)
            .with_duration(duration)
            .with_reflection(reflection);
        self.record_active_entry(entry)?;

        self.status = HabitStatus::Idle;
        self.started_at = None;
        self.paused_duration = 0;
        self.updated_at = now;

        let flags = patterns::detect(&ctx);
        if !flags.is_empty() {
            tracing::info!(habit_id = %self.id, ?flags, "completion flagged");
        }

        Ok(CompletionOutcome {
            date: today,
            streak: self.streak,
            duration,
            flags,
        })
    }

    /// Mark `date` as skipped. At most one skip per Monday..=Sunday week, and
    /// never on two adjacent days.
    pub fn skip_day(&mut self, date: NaiveDate, now: DateTime<Utc>) -> Result<u32> {
        let today = calendar_day(now);
        if date > today {
            return Err(CadenceError::InvalidInput(format!(
                "cannot skip {date}: it is in the future"
            )));
        }
        if self.completion_history.find_entry_for_date(date).is_some() {
            return Err(Conflict::DuplicateEntry { date }.into());
        }
        let day = Duration::days(1);
        if self.completion_history.is_skipped_on(date - day)
            || self.completion_history.is_skipped_on(date + day)
        {
            return Err(Conflict::ConsecutiveSkip { date }.into());
        }
        if self.completion_history.skipped_in_week(date).is_some() {
            return Err(Conflict::WeeklySkipLimit {
                week_start: week_start(date),
            }
            .into());
        }

        self.record_active_entry(CompletionEntry::skipped(date, now))?;

        if date == today {
            // Time tracked today belongs to the skipped day.
            self.status = HabitStatus::Idle;
            self.started_at = None;
            self.paused_duration = 0;
        }
        self.updated_at = now;
        Ok(self.streak)
    }

    /// Remove today's entry and rebuild the streak from history.
    pub fn uncomplete(&mut self, now: DateTime<Utc>) -> Result<CompletionEntry> {
        let today = calendar_day(now);
        let removed = self.completion_history.remove_for_date(today)?;
        self.status = HabitStatus::Idle;
        self.started_at = None;
        streak::apply(self);
        self.updated_at = now;
        Ok(removed)
    }

    /// Administrative override. History is left alone, so the cached streak
    /// can disagree with it until the next recomputation.
    pub fn reset_streak(&mut self, now: DateTime<Utc>) {
        self.streak = 0;
        self.last_completed = None;
        self.updated_at = now;
    }

    /// Append an active entry and advance the streak.
    ///
    /// For the newest day the streak continues when the previous calendar day
    /// is active and restarts at 1 otherwise. A back-dated entry can join two
    /// runs, so it falls back to a full recomputation.
    fn record_active_entry(&mut self, entry: CompletionEntry) -> Result<()> {
        let date = entry.date;
        let is_newest = self
            .completion_history
            .latest_date()
            .map_or(true, |latest| date > latest);

        self.completion_history.append(entry)?;

        if is_newest {
            let yesterday = date - Duration::days(1);
            self.streak = if self.completion_history.is_active_on(yesterday) {
                self.streak + 1
            } else {
                1
            };
            self.last_completed = Some(date);
        } else {
            streak::apply(self);
        }
        Ok(())
    }
}

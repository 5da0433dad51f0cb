//! Habit service façade used by the web and CLI front ends.
//!
//! Every mutating call loads the habit, checks ownership, runs the state
//! machine, persists the result and appends an audit event. Mutations for one
//! user run one at a time so the "one in-progress habit" and "one entry per
//! day" checks cannot race.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::clock::{week_days, week_start, Clock};
use crate::config::{CadenceConfig, HabitsConfig};
use crate::error::{CadenceError, Result};
use crate::history::{diff_update, EventAction, HabitEvent, HistoryLogger};
use crate::model::*;
use crate::state::CompletionOutcome;
use crate::storage::StorageBackend;
use crate::streak;

/// Body of a completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteRequest {
    /// Seconds. Falls back to the tracked timer time.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub reflection: Option<String>,
}

/// Today's counts over a set of habits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCounts {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub not_done: usize,
}

impl DayCounts {
    fn record(&mut self, status: Option<CompletionStatus>) {
        self.total += 1;
        match status {
            Some(CompletionStatus::Completed) => self.completed += 1,
            Some(CompletionStatus::Skipped) => self.skipped += 1,
            Some(CompletionStatus::Incomplete) | None => self.not_done += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub category: String,
    #[serde(flatten)]
    pub counts: DayCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: DayCounts,
    pub categories: Vec<CategoryCounts>,
}

/// One cell of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    Completed,
    Skipped,
    Incomplete,
    /// A planned rest weekday with no entry.
    Rest,
    Missed,
    /// Today, nothing recorded yet.
    Pending,
    Upcoming,
}

impl DayState {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Completed => "✓",
            Self::Skipped => "~",
            Self::Incomplete => "x",
            Self::Rest => "z",
            Self::Missed => "·",
            Self::Pending => "?",
            Self::Upcoming => " ",
        }
    }
}

impl std::fmt::Display for DayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Rest => write!(f, "rest"),
            Self::Missed => write!(f, "missed"),
            Self::Pending => write!(f, "pending"),
            Self::Upcoming => write!(f, "upcoming"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub state: DayState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitWeek {
    pub habit_id: Uuid,
    pub name: String,
    pub category: String,
    pub streak: u32,
    pub days_per_week: u8,
    /// Completed or skipped days this week.
    pub active_days: usize,
    pub cells: Vec<DayCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAnalytics {
    pub week_start: NaiveDate,
    pub today: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub habits: Vec<HabitWeek>,
}

/// A completed day awaiting an honesty review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReview {
    pub habit_id: Uuid,
    pub habit_name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
}

fn week_cell(habit: &Habit, date: NaiveDate, today: NaiveDate) -> DayState {
    match habit.completion_history.find_entry_for_date(date) {
        Some(entry) => match entry.status {
            CompletionStatus::Completed => DayState::Completed,
            CompletionStatus::Skipped => DayState::Skipped,
            CompletionStatus::Incomplete => DayState::Incomplete,
        },
        None if habit.is_rest_day(date) => DayState::Rest,
        None if date > today => DayState::Upcoming,
        None if date == today => DayState::Pending,
        None => DayState::Missed,
    }
}

pub struct HabitService<S: StorageBackend> {
    storage: S,
    clock: Arc<dyn Clock>,
    history: HistoryLogger,
    defaults: HabitsConfig,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: StorageBackend> HabitService<S> {
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            history: HistoryLogger::disabled(),
            defaults: HabitsConfig::default(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Service wired to the configured audit log and habit defaults.
    pub fn from_config(storage: S, clock: Arc<dyn Clock>, config: &CadenceConfig) -> Self {
        let history = match config.history_path() {
            Some(path) => HistoryLogger::with_path(path, config.history.enabled),
            None => HistoryLogger::new(config.history.enabled),
        };
        Self::new(storage, clock)
            .with_history(history)
            .with_defaults(config.habits.clone())
    }

    pub fn with_history(mut self, history: HistoryLogger) -> Self {
        self.history = history;
        self
    }

    pub fn with_defaults(mut self, defaults: HabitsConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // -- CRUD --

    pub async fn create_habit(&self, user_id: &str, mut input: CreateHabitInput) -> Result<Habit> {
        validate_create_input(&input)?;
        if input.category.as_deref().map_or(true, |c| c.trim().is_empty()) {
            input.category = Some(self.defaults.default_category.clone());
        }
        if input.minimum_duration.is_none() {
            input.minimum_duration = Some(self.defaults.default_minimum_duration);
        }

        let habit = Habit::from_input(user_id.to_string(), input, self.clock.now());
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %habit.id, owner = user_id, "habit created");
        self.record(HabitEvent::for_habit(&habit, EventAction::Created, user_id));
        Ok(habit)
    }

    pub async fn get_habit(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        self.load_owned(user_id, id).await
    }

    /// Habits owned by `query.owner_id`.
    pub async fn list_habits(&self, query: &HabitQuery) -> Result<Vec<Habit>> {
        self.storage.list_habits(query).await
    }

    pub async fn update_habit(
        &self,
        user_id: &str,
        id: Uuid,
        input: UpdateHabitInput,
    ) -> Result<Habit> {
        validate_update_input(&input)?;
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let changes = diff_update(&habit, &input);
        habit.apply_update(&input, self.clock.now());
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, changed = changes.len(), "habit updated");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::Updated, user_id).with_changes(changes),
        );
        Ok(habit)
    }

    /// Soft delete. A running timer is stopped.
    pub async fn archive_habit(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        if !habit.is_active {
            tracing::debug!(habit_id = %id, "habit already archived");
            return Ok(habit);
        }

        let now = self.clock.now();
        habit.pause(now);
        habit.is_active = false;
        habit.updated_at = now;
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, "habit archived");
        self.record(HabitEvent::for_habit(&habit, EventAction::Archived, user_id));
        Ok(habit)
    }

    /// Hard delete, history included.
    pub async fn delete_habit(&self, user_id: &str, id: Uuid) -> Result<()> {
        let _guard = self.lock_user(user_id).await;
        let habit = self.load_owned(user_id, id).await?;
        self.storage.delete_habit(id).await?;

        tracing::info!(habit_id = %id, "habit deleted");
        self.record(HabitEvent::for_habit(&habit, EventAction::Deleted, user_id));
        Ok(())
    }

    // -- State machine --

    pub async fn start(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let running = self
            .storage
            .find_in_progress(user_id)
            .await?
            .map(|other| other.id);
        habit.start(self.clock.now(), running)?;
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, "timer started");
        self.record(HabitEvent::for_habit(&habit, EventAction::Started, user_id));
        Ok(habit)
    }

    /// Idle habits are returned unchanged.
    pub async fn pause(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;

        let Some(elapsed) = habit.pause(self.clock.now()) else {
            return Ok(habit);
        };
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, elapsed, "timer paused");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::Paused, user_id)
                .with_notes(vec![format!("{elapsed}s elapsed")]),
        );
        Ok(habit)
    }

    pub async fn complete(
        &self,
        user_id: &str,
        id: Uuid,
        request: CompleteRequest,
    ) -> Result<(Habit, CompletionOutcome)> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let outcome = habit.complete(
            self.clock.now(),
            request.duration,
            request.reflection.as_deref(),
        )?;
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, streak = outcome.streak, "habit completed");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::Completed, user_id)
                .with_date(outcome.date)
                .with_notes(outcome.flags.iter().map(ToString::to_string).collect()),
        );
        Ok((habit, outcome))
    }

    /// Skip `date`, or today when `None`.
    pub async fn skip_day(
        &self,
        user_id: &str,
        id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let now = self.clock.now();
        let date = date.unwrap_or_else(|| self.clock.today());
        let streak = habit.skip_day(date, now)?;
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, %date, streak, "day skipped");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::Skipped, user_id).with_date(date),
        );
        Ok(habit)
    }

    /// Undo today's entry.
    pub async fn uncomplete(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let removed = habit.uncomplete(self.clock.now())?;
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, date = %removed.date, streak = habit.streak, "entry removed");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::Uncompleted, user_id)
                .with_date(removed.date)
                .with_notes(vec![format!("removed {} entry", removed.status)]),
        );
        Ok(habit)
    }

    /// Zero the cached streak. History is kept, so the two disagree until
    /// [`recompute_streak`](Self::recompute_streak) runs.
    pub async fn reset_streak(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let previous = habit.streak;
        habit.reset_streak(self.clock.now());
        self.storage.save_habit(&habit).await?;

        tracing::info!(habit_id = %id, previous, "streak reset");
        self.record(
            HabitEvent::for_habit(&habit, EventAction::StreakReset, user_id)
                .with_notes(vec![format!("was {previous}")]),
        );
        Ok(habit)
    }

    /// Rebuild the streak from history.
    pub async fn recompute_streak(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;

        let previous = habit.streak;
        let summary = streak::apply(&mut habit);
        if summary.streak != previous {
            tracing::info!(habit_id = %id, previous, streak = summary.streak, "streak resynced");
        }
        habit.updated_at = self.clock.now();
        self.storage.save_habit(&habit).await?;

        self.record(HabitEvent::for_habit(&habit, EventAction::StreakRecomputed, user_id));
        Ok(habit)
    }

    pub async fn set_honesty(
        &self,
        user_id: &str,
        id: Uuid,
        date: NaiveDate,
        honesty: HonestyStatus,
    ) -> Result<Habit> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        habit.completion_history.update_honesty(date, honesty)?;
        habit.updated_at = self.clock.now();
        self.storage.save_habit(&habit).await?;

        self.record(
            HabitEvent::for_habit(&habit, EventAction::HonestyReviewed, user_id)
                .with_date(date)
                .with_notes(vec![honesty.to_string()]),
        );
        Ok(habit)
    }

    /// Apply several reviews at once. Days without an entry are skipped
    /// individually and reported in the outcome.
    pub async fn review_honesty(
        &self,
        user_id: &str,
        id: Uuid,
        reviews: &[(NaiveDate, HonestyStatus)],
    ) -> Result<(Habit, ReviewOutcome)> {
        let _guard = self.lock_user(user_id).await;
        let mut habit = self.load_owned(user_id, id).await?;
        ensure_active(&habit)?;

        let outcome = habit.completion_history.review_honesty(reviews);
        if !outcome.unmatched.is_empty() {
            tracing::warn!(
                habit_id = %id,
                unmatched = outcome.unmatched.len(),
                "honesty review: some days have no entry"
            );
        }
        if outcome.applied.is_empty() {
            return Ok((habit, outcome));
        }

        habit.updated_at = self.clock.now();
        self.storage.save_habit(&habit).await?;

        self.record(
            HabitEvent::for_habit(&habit, EventAction::HonestyReviewed, user_id).with_notes(
                outcome
                    .applied
                    .iter()
                    .map(|d| format!("reviewed {d}"))
                    .collect(),
            ),
        );
        Ok((habit, outcome))
    }

    // -- Read models --

    pub async fn daily_analytics(&self, user_id: &str) -> Result<DailyAnalytics> {
        let today = self.clock.today();
        let habits = self
            .storage
            .list_habits(&HabitQuery::active_for(user_id))
            .await?;

        let mut counts = DayCounts::default();
        let mut by_category: BTreeMap<String, DayCounts> = BTreeMap::new();
        for habit in &habits {
            let status = habit
                .completion_history
                .find_entry_for_date(today)
                .map(|e| e.status);
            counts.record(status);
            by_category
                .entry(habit.category.clone())
                .or_default()
                .record(status);
        }

        Ok(DailyAnalytics {
            date: today,
            counts,
            categories: by_category
                .into_iter()
                .map(|(category, counts)| CategoryCounts { category, counts })
                .collect(),
        })
    }

    pub async fn weekly_analytics(&self, user_id: &str) -> Result<WeeklyAnalytics> {
        let today = self.clock.today();
        let days = week_days(today);
        let habits = self
            .storage
            .list_habits(&HabitQuery::active_for(user_id))
            .await?;

        let habits = habits
            .iter()
            .map(|habit| {
                let cells: Vec<DayCell> = days
                    .iter()
                    .map(|&date| DayCell {
                        date,
                        state: week_cell(habit, date, today),
                    })
                    .collect();
                HabitWeek {
                    habit_id: habit.id,
                    name: habit.name.clone(),
                    category: habit.category.clone(),
                    streak: habit.streak,
                    days_per_week: habit.days_per_week,
                    active_days: cells
                        .iter()
                        .filter(|c| matches!(c.state, DayState::Completed | DayState::Skipped))
                        .count(),
                    cells,
                }
            })
            .collect();

        Ok(WeeklyAnalytics {
            week_start: week_start(today),
            today,
            days,
            habits,
        })
    }

    /// Completed days without an honesty status, newest first, for habits in
    /// accountability mode.
    pub async fn pending_reviews(&self, user_id: &str) -> Result<Vec<PendingReview>> {
        let habits = self
            .storage
            .list_habits(&HabitQuery::active_for(user_id))
            .await?;

        let mut pending: Vec<PendingReview> = habits
            .iter()
            .filter(|h| h.accountability_mode)
            .flat_map(|habit| {
                habit
                    .completion_history
                    .iter()
                    .filter(|e| {
                        e.status == CompletionStatus::Completed && e.honesty_status.is_none()
                    })
                    .map(move |e| PendingReview {
                        habit_id: habit.id,
                        habit_name: habit.name.clone(),
                        date: e.date,
                        duration: e.duration,
                        reflection: e.reflection.clone(),
                    })
            })
            .collect();
        pending.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.habit_name.cmp(&b.habit_name)));
        Ok(pending)
    }

    /// Audit events for a habit, most recent first.
    pub async fn history_for(&self, user_id: &str, id: Uuid) -> Result<Vec<HabitEvent>> {
        self.load_owned(user_id, id).await?;
        Ok(self.history.history_for(id))
    }

    /// The user's most recent audit events across all habits.
    pub fn recent_events(&self, user_id: &str, limit: usize) -> Vec<HabitEvent> {
        self.history.recent_for_actor(user_id, limit)
    }

    // -- helpers --

    /// Foreign habits are reported as missing.
    async fn load_owned(&self, user_id: &str, id: Uuid) -> Result<Habit> {
        let habit = self.storage.get_habit(id).await?;
        if habit.owner_id != user_id {
            tracing::debug!(habit_id = %id, "habit owned by another user");
            return Err(CadenceError::NotFound(format!("habit {id}")));
        }
        Ok(habit)
    }

    async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.user_locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Evict locks no task holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked_user_locks(&self) -> usize {
        match self.user_locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn record(&self, mut event: HabitEvent) {
        event.timestamp = self.clock.now();
        self.history.log(&event);
    }
}

fn ensure_active(habit: &Habit) -> Result<()> {
    if !habit.is_active {
        return Err(CadenceError::InvalidInput(format!(
            "habit {} is archived",
            habit.id
        )));
    }
    Ok(())
}

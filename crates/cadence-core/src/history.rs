//! Append-only audit trail for habit mutations.
//!
//! Events are stored as JSONL at `~/.config/cadence/history.jsonl`.
//! Each line is a self-contained [`HabitEvent`] that records who did what and when.
//! Write failures are logged and swallowed; auditing never blocks an operation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use crate::model::{Habit, UpdateHabitInput};

/// What happened to the habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Updated,
    Started,
    Paused,
    Completed,
    Skipped,
    Uncompleted,
    StreakReset,
    StreakRecomputed,
    HonestyReviewed,
    Archived,
    Deleted,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Started => write!(f, "started"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Uncompleted => write!(f, "uncompleted"),
            Self::StreakReset => write!(f, "streak_reset"),
            Self::StreakRecomputed => write!(f, "streak_recomputed"),
            Self::HonestyReviewed => write!(f, "honesty_reviewed"),
            Self::Archived => write!(f, "archived"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A single field change in an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// A single audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitEvent {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub action: EventAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_name: Option<String>,
}

impl HabitEvent {
    pub fn new(habit_id: Uuid, action: EventAction, actor: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            habit_id,
            action,
            actor,
            timestamp: Utc::now(),
            date: None,
            streak: None,
            changes: Vec::new(),
            notes: Vec::new(),
            habit_name: None,
        }
    }

    /// Event for `habit`, carrying its name and current streak.
    pub fn for_habit(habit: &Habit, action: EventAction, actor: &str) -> Self {
        Self::new(habit.id, action, actor.to_string())
            .with_name(&habit.name)
            .with_streak(habit.streak)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.habit_name = Some(name.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_streak(mut self, streak: u32) -> Self {
        self.streak = Some(streak);
        self
    }

    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Append-only JSONL logger for habit events.
pub struct HistoryLogger {
    path: PathBuf,
    enabled: bool,
}

impl HistoryLogger {
    pub fn new(enabled: bool) -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cadence")
            .join("history.jsonl");
        Self { path, enabled }
    }

    pub fn with_path(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// A logger that drops everything.
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Log a single event by appending one JSON line.
    pub fn log(&self, event: &HabitEvent) {
        if !self.enabled {
            return;
        }
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let line = match serde_json::to_string(event) {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!("history: failed to serialize event: {e}");
                return;
            }
        };
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path);
        match file {
            Ok(mut f) => {
                let _ = writeln!(f, "{}", line);
            }
            Err(e) => {
                tracing::debug!("history: failed to open log: {e}");
            }
        }
    }

    /// Get all events for a specific habit, most recent first.
    pub fn history_for(&self, habit_id: Uuid) -> Vec<HabitEvent> {
        let mut events = self.read_all();
        events.retain(|e| e.habit_id == habit_id);
        events.reverse();
        events
    }

    /// Get the N most recent events by `actor`.
    pub fn recent_for_actor(&self, actor: &str, limit: usize) -> Vec<HabitEvent> {
        let mut events = self.read_all();
        events.retain(|e| e.actor == actor);
        events.reverse();
        events.truncate(limit);
        events
    }

    fn read_all(&self) -> Vec<HabitEvent> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

/// Compute field-level diffs between the old habit and an update input.
pub fn diff_update(old: &Habit, input: &UpdateHabitInput) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    let mut push = |field: &str, old_value: String, new_value: String| {
        if old_value != new_value {
            changes.push(FieldChange {
                field: field.to_string(),
                old_value,
                new_value,
            });
        }
    };

    if let Some(ref name) = input.name {
        push("name", old.name.clone(), name.trim().to_string());
    }
    if let Some(ref description) = input.description {
        push(
            "description",
            format!("({} chars)", old.description.chars().count()),
            format!("({} chars)", description.chars().count()),
        );
    }
    if input.category.is_some() {
        push(
            "category",
            old.category.clone(),
            crate::model::normalize_category(input.category.as_deref()),
        );
    }
    if let Some(days) = input.days_per_week {
        push(
            "days_per_week",
            old.days_per_week.to_string(),
            days.to_string(),
        );
    }
    if let Some(ref skip_days) = input.skip_days {
        let fmt = |days: &[chrono::Weekday]| {
            days.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        push(
            "skip_days",
            fmt(old.skip_days.as_slice()),
            fmt(skip_days.as_slice()),
        );
    }
    if let Some(minutes) = input.minimum_duration {
        push(
            "minimum_duration",
            old.minimum_duration.to_string(),
            minutes.to_string(),
        );
    }
    if let Some(enabled) = input.accountability_mode {
        push(
            "accountability_mode",
            old.accountability_mode.to_string(),
            enabled.to_string(),
        );
    }

    changes
}

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::completion::CompletionHistory;
use crate::error::{CadenceError, Result};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_CATEGORY_LENGTH: usize = 50;
pub const DEFAULT_CATEGORY: &str = "general";
/// Bounds for `minimum_duration`, in minutes.
pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 480;
pub const DEFAULT_MINIMUM_DURATION: u32 = 10;

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CadenceError::InvalidInput("name cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CadenceError::InvalidInput(format!(
            "name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(CadenceError::InvalidInput(format!(
            "description exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<()> {
    if category.trim().chars().count() > MAX_CATEGORY_LENGTH {
        return Err(CadenceError::InvalidInput(format!(
            "category exceeds maximum length of {MAX_CATEGORY_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_minimum_duration(minutes: u32) -> Result<()> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(CadenceError::InvalidInput(format!(
            "minimum duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )));
    }
    Ok(())
}

fn validate_days_per_week(days: u8) -> Result<()> {
    if !(1..=7).contains(&days) {
        return Err(CadenceError::InvalidInput(
            "days per week must be between 1 and 7".into(),
        ));
    }
    Ok(())
}

fn validate_skip_days(days: &[Weekday]) -> Result<()> {
    for (i, day) in days.iter().enumerate() {
        if days[..i].contains(day) {
            return Err(CadenceError::InvalidInput(format!(
                "skip day {day} listed more than once"
            )));
        }
    }
    if days.len() == 7 {
        return Err(CadenceError::InvalidInput(
            "a habit cannot rest every day of the week".into(),
        ));
    }
    Ok(())
}

/// Lower-cased, trimmed category; blank falls back to `"general"`.
pub fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_lowercase(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Validate inputs for creating a new habit.
pub fn validate_create_input(input: &CreateHabitInput) -> Result<()> {
    validate_name(&input.name)?;
    if let Some(ref description) = input.description {
        validate_description(description)?;
    }
    if let Some(ref category) = input.category {
        validate_category(category)?;
    }
    validate_days_per_week(input.days_per_week)?;
    validate_skip_days(&input.skip_days)?;
    if let Some(minutes) = input.minimum_duration {
        validate_minimum_duration(minutes)?;
    }
    Ok(())
}

/// Validate inputs for updating an existing habit.
pub fn validate_update_input(input: &UpdateHabitInput) -> Result<()> {
    if let Some(ref name) = input.name {
        validate_name(name)?;
    }
    if let Some(ref description) = input.description {
        validate_description(description)?;
    }
    if let Some(ref category) = input.category {
        validate_category(category)?;
    }
    if let Some(days) = input.days_per_week {
        validate_days_per_week(days)?;
    }
    if let Some(ref skip_days) = input.skip_days {
        validate_skip_days(skip_days)?;
    }
    if let Some(minutes) = input.minimum_duration {
        validate_minimum_duration(minutes)?;
    }
    Ok(())
}

/// Operational timer state. Only one habit per user may be in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HabitStatus {
    #[default]
    Idle,
    InProgress,
}

impl std::fmt::Display for HabitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InProgress => write!(f, "in-progress"),
        }
    }
}

impl std::str::FromStr for HabitStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "idle" => Ok(Self::Idle),
            "in-progress" => Ok(Self::InProgress),
            _ => Err(format!("unknown habit status: {s}")),
        }
    }
}

/// A habit owned by a single user, with its per-day completion log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub status: HabitStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds accumulated across pause/resume cycles for the current day.
    #[serde(default)]
    pub paused_duration: u64,
    #[serde(default)]
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
    #[serde(default)]
    pub completion_history: CompletionHistory,
    pub days_per_week: u8,
    #[serde(default)]
    pub skip_days: Vec<Weekday>,
    /// Minutes.
    pub minimum_duration: u32,
    #[serde(default)]
    pub accountability_mode: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(owner_id: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id,
            name,
            description: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            status: HabitStatus::Idle,
            started_at: None,
            paused_duration: 0,
            streak: 0,
            last_completed: None,
            completion_history: CompletionHistory::new(),
            days_per_week: default_days_per_week(),
            skip_days: Vec::new(),
            minimum_duration: DEFAULT_MINIMUM_DURATION,
            accountability_mode: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a habit from already-validated input.
    pub fn from_input(owner_id: String, input: CreateHabitInput, now: DateTime<Utc>) -> Self {
        let category = normalize_category(input.category.as_deref());
        Self::new(owner_id, input.name.trim().to_string(), now)
            .with_description(input.description.unwrap_or_default())
            .with_category(category)
            .with_days_per_week(input.days_per_week)
            .with_skip_days(input.skip_days)
            .with_minimum_duration(input.minimum_duration.unwrap_or(DEFAULT_MINIMUM_DURATION))
            .with_accountability_mode(input.accountability_mode)
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_category(mut self, category: String) -> Self {
        self.category = category;
        self
    }

    pub fn with_days_per_week(mut self, days: u8) -> Self {
        self.days_per_week = days.clamp(1, 7);
        self
    }

    pub fn with_skip_days(mut self, skip_days: Vec<Weekday>) -> Self {
        self.skip_days = skip_days;
        self
    }

    pub fn with_minimum_duration(mut self, minutes: u32) -> Self {
        self.minimum_duration = minutes.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);
        self
    }

    pub fn with_accountability_mode(mut self, enabled: bool) -> Self {
        self.accountability_mode = enabled;
        self
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == HabitStatus::InProgress
    }

    /// Has the timer been used since the last completion?
    pub fn timer_used(&self) -> bool {
        self.started_at.is_some() || self.paused_duration > 0
    }

    /// Seconds tracked by the timer so far, including a running session.
    pub fn tracked_seconds(&self, now: DateTime<Utc>) -> u64 {
        let running = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.paused_duration + running
    }

    /// Is `date` one of the habit's planned rest weekdays?
    pub fn is_rest_day(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.skip_days.contains(&date.weekday())
    }

    /// Apply a validated update in place.
    pub fn apply_update(&mut self, input: &UpdateHabitInput, now: DateTime<Utc>) {
        if let Some(ref name) = input.name {
            self.name = name.trim().to_string();
        }
        if let Some(ref description) = input.description {
            self.description = description.clone();
        }
        if input.category.is_some() {
            self.category = normalize_category(input.category.as_deref());
        }
        if let Some(days) = input.days_per_week {
            self.days_per_week = days;
        }
        if let Some(ref skip_days) = input.skip_days {
            self.skip_days = skip_days.clone();
        }
        if let Some(minutes) = input.minimum_duration {
            self.minimum_duration = minutes;
        }
        if let Some(enabled) = input.accountability_mode {
            self.accountability_mode = enabled;
        }
        self.updated_at = now;
    }
}

/// Compact listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSummary {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub status: HabitStatus,
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
    pub is_active: bool,
}

impl From<&Habit> for HabitSummary {
    fn from(habit: &Habit) -> Self {
        Self {
            id: habit.id,
            name: habit.name.clone(),
            category: habit.category.clone(),
            status: habit.status,
            streak: habit.streak,
            last_completed: habit.last_completed,
            is_active: habit.is_active,
        }
    }
}

/// Input for creating a new habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHabitInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_days_per_week")]
    pub days_per_week: u8,
    #[serde(default)]
    pub skip_days: Vec<Weekday>,
    /// Minutes. Falls back to the configured default when absent.
    #[serde(default)]
    pub minimum_duration: Option<u32>,
    #[serde(default)]
    pub accountability_mode: bool,
}

impl CreateHabitInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: None,
            days_per_week: default_days_per_week(),
            skip_days: Vec::new(),
            minimum_duration: None,
            accountability_mode: false,
        }
    }
}

fn default_days_per_week() -> u8 {
    7
}

/// Input for updating an existing habit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateHabitInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub days_per_week: Option<u8>,
    pub skip_days: Option<Vec<Weekday>>,
    pub minimum_duration: Option<u32>,
    pub accountability_mode: Option<bool>,
}

/// Filter for listing habits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitQuery {
    pub owner_id: String,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl HabitQuery {
    pub fn active_for(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            include_inactive: false,
            category: None,
        }
    }
}

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::week_start;
use crate::error::{CadenceError, Conflict, Result};

/// Minimum length of a reflection once trimmed.
pub const MIN_REFLECTION_LENGTH: usize = 5;
pub const MAX_REFLECTION_LENGTH: usize = 2_000;
/// Longest session a completion may record: 480 minutes.
pub const MAX_COMPLETION_DURATION_SECS: u64 = 480 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Skipped,
    Incomplete,
}

impl CompletionStatus {
    /// Completed and skipped days keep a streak alive.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

impl std::str::FromStr for CompletionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "incomplete" => Ok(Self::Incomplete),
            _ => Err(format!("unknown completion status: {s}")),
        }
    }
}

/// Post-hoc self assessment of a completed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HonestyStatus {
    Honest,
    NotReally,
}

impl std::fmt::Display for HonestyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Honest => write!(f, "honest"),
            Self::NotReally => write!(f, "not-really"),
        }
    }
}

impl std::str::FromStr for HonestyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "honest" => Ok(Self::Honest),
            "not-really" => Ok(Self::NotReally),
            _ => Err(format!("unknown honesty status: {s}")),
        }
    }
}

/// One calendar day in a habit's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub date: NaiveDate,
    pub status: CompletionStatus,
    /// Elapsed seconds for the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honesty_status: Option<HonestyStatus>,
    pub recorded_at: DateTime<Utc>,
}

impl CompletionEntry {
    pub fn new(date: NaiveDate, status: CompletionStatus, recorded_at: DateTime<Utc>) -> Self {
        Self {
            date,
            status,
            duration: None,
            reflection: None,
            honesty_status: None,
            recorded_at,
        }
    }

    pub fn completed(date: NaiveDate, recorded_at: DateTime<Utc>) -> Self {
        Self::new(date, CompletionStatus::Completed, recorded_at)
    }

    pub fn skipped(date: NaiveDate, recorded_at: DateTime<Utc>) -> Self {
        Self::new(date, CompletionStatus::Skipped, recorded_at)
    }

    pub fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_reflection(mut self, reflection: Option<String>) -> Self {
        self.reflection = reflection;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Trim a reflection and enforce its length bounds. Blank input counts as absent.
pub fn normalize_reflection(reflection: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = reflection else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let len = trimmed.chars().count();
    if len < MIN_REFLECTION_LENGTH {
        return Err(CadenceError::InvalidInput(format!(
            "reflection must be at least {MIN_REFLECTION_LENGTH} characters"
        )));
    }
    if len > MAX_REFLECTION_LENGTH {
        return Err(CadenceError::InvalidInput(format!(
            "reflection exceeds maximum length of {MAX_REFLECTION_LENGTH} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Reject a reported session longer than [`MAX_COMPLETION_DURATION_SECS`].
pub fn validate_duration(duration: Option<u64>) -> Result<()> {
    match duration {
        Some(secs) if secs > MAX_COMPLETION_DURATION_SECS => Err(CadenceError::InvalidInput(
            format!("duration must be at most {MAX_COMPLETION_DURATION_SECS} seconds"),
        )),
        _ => Ok(()),
    }
}

/// Result of applying a batch of honesty reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub applied: Vec<NaiveDate>,
    pub unmatched: Vec<NaiveDate>,
}

/// Per-day log attached to a habit. Keeps insertion order; at most one
/// entry per calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionHistory(Vec<CompletionEntry>);

impl CompletionHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn entries(&self) -> &[CompletionEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompletionEntry> {
        self.0.iter()
    }

    pub fn find_entry_for_date(&self, date: NaiveDate) -> Option<&CompletionEntry> {
        self.0.iter().find(|e| e.date == date)
    }

    pub fn append(&mut self, entry: CompletionEntry) -> Result<()> {
        if self.find_entry_for_date(entry.date).is_some() {
            return Err(Conflict::DuplicateEntry { date: entry.date }.into());
        }
        self.0.push(entry);
        Ok(())
    }

    pub fn remove_for_date(&mut self, date: NaiveDate) -> Result<CompletionEntry> {
        let pos = self
            .0
            .iter()
            .position(|e| e.date == date)
            .ok_or_else(|| CadenceError::NotFound(format!("no entry for {date}")))?;
        Ok(self.0.remove(pos))
    }

    /// Annotate the completed entry on `date`. Skipped and incomplete days
    /// cannot be reviewed.
    pub fn update_honesty(&mut self, date: NaiveDate, honesty: HonestyStatus) -> Result<()> {
        let entry = self
            .0
            .iter_mut()
            .find(|e| e.date == date)
            .ok_or_else(|| CadenceError::NotFound(format!("no entry for {date}")))?;
        if entry.status != CompletionStatus::Completed {
            return Err(CadenceError::InvalidInput(format!(
                "entry for {date} is {}, only completed days can be reviewed",
                entry.status
            )));
        }
        entry.honesty_status = Some(honesty);
        Ok(())
    }

    /// Apply a batch of reviews. Days without a completed entry are reported
    /// back instead of failing the whole batch.
    pub fn review_honesty(&mut self, reviews: &[(NaiveDate, HonestyStatus)]) -> ReviewOutcome {
        let mut outcome = ReviewOutcome::default();
        for (date, honesty) in reviews {
            match self.update_honesty(*date, *honesty) {
                Ok(()) => outcome.applied.push(*date),
                Err(_) => {
                    tracing::debug!(%date, "honesty review: no completed entry, skipping");
                    outcome.unmatched.push(*date);
                }
            }
        }
        outcome
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.find_entry_for_date(date)
            .map(|e| e.is_active())
            .unwrap_or(false)
    }

    pub fn is_skipped_on(&self, date: NaiveDate) -> bool {
        self.find_entry_for_date(date)
            .map(|e| e.status == CompletionStatus::Skipped)
            .unwrap_or(false)
    }

    /// A skipped entry somewhere in the Monday..=Sunday week containing `date`.
    pub fn skipped_in_week(&self, date: NaiveDate) -> Option<&CompletionEntry> {
        let monday = week_start(date);
        let sunday = monday + Duration::days(6);
        self.0.iter().find(|e| {
            e.status == CompletionStatus::Skipped && e.date >= monday && e.date <= sunday
        })
    }

    /// Sorted, de-duplicated dates of active entries.
    pub fn active_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .0
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.date)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// The most recent entry date, active or not.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.0.iter().map(|e| e.date).max()
    }
}

impl From<Vec<CompletionEntry>> for CompletionHistory {
    fn from(entries: Vec<CompletionEntry>) -> Self {
        Self(entries)
    }
}

impl<'a> IntoIterator for &'a CompletionHistory {
    type Item = &'a CompletionEntry;
    type IntoIter = std::slice::Iter<'a, CompletionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

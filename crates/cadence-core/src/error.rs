use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(#[from] Conflict),
}

/// Invariant violations the caller can resolve by waiting or picking another action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("another habit ({habit_id}) is already in progress")]
    AlreadyInProgress { habit_id: Uuid },

    #[error("habit is already in progress")]
    AlreadyRunning,

    #[error("an entry already exists for {date}")]
    DuplicateEntry { date: NaiveDate },

    #[error("cannot skip {date}: an adjacent day is already skipped")]
    ConsecutiveSkip { date: NaiveDate },

    #[error("only one skip is allowed per week (week of {week_start})")]
    WeeklySkipLimit { week_start: NaiveDate },
}

/// User-facing error categories. The web layer maps these to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Dependency,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::NotFound => write!(f, "not_found"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

impl CadenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Storage(_) | Self::Serialization(_) | Self::Config(_) => {
                ErrorCategory::Dependency
            }
        }
    }

    /// Returns `true` when the error is likely transient and worth retrying
    /// (SQLite busy/locked, I/O hiccups).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(msg) => is_transient_message(msg),
            _ => false,
        }
    }

    /// The conflict payload, if this is a conflict.
    pub fn as_conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

fn is_transient_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    let patterns = [
        "database is locked",
        "database is busy",
        "database table is locked",
        "timed out",
        "temporarily unavailable",
        "disk i/o error",
    ];
    patterns.iter().any(|p| msg_lower.contains(p))
}

pub type Result<T> = std::result::Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_locked() {
        let err = CadenceError::Storage("failed to save habit: database is locked".into());
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_busy() {
        let err = CadenceError::Storage("Database is busy".into());
        assert!(err.is_transient());
    }

    #[test]
    fn test_permanent_storage() {
        let err = CadenceError::Storage("no such table: habits".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_permanent_not_found() {
        let err = CadenceError::NotFound("habit xyz".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            CadenceError::InvalidInput("x".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            CadenceError::NotFound("x".into()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            CadenceError::Storage("x".into()).category(),
            ErrorCategory::Dependency
        );
        let conflict: CadenceError = Conflict::AlreadyRunning.into();
        assert_eq!(conflict.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_conflict_message() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let err: CadenceError = Conflict::DuplicateEntry { date }.into();
        assert_eq!(
            err.to_string(),
            "Conflict: an entry already exists for 2026-03-02"
        );
        assert_eq!(err.as_conflict(), Some(&Conflict::DuplicateEntry { date }));
    }
}

//! Advisory pattern detection on completion.
//!
//! Flags are informational: they are returned to the caller and logged, but
//! never stop a completion from being recorded.

use serde::{Deserialize, Serialize};

/// Completions under this many seconds count as "very quick".
pub const QUICK_COMPLETION_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternFlag {
    #[serde(rename = "completed very quickly")]
    CompletedVeryQuickly,
    #[serde(rename = "completed without timer")]
    CompletedWithoutTimer,
    #[serde(rename = "shorter than minimum duration")]
    BelowMinimumDuration,
}

impl std::fmt::Display for PatternFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedVeryQuickly => write!(f, "completed very quickly"),
            Self::CompletedWithoutTimer => write!(f, "completed without timer"),
            Self::BelowMinimumDuration => write!(f, "shorter than minimum duration"),
        }
    }
}

/// Habit state captured just before a completion is applied.
#[derive(Debug, Clone, Copy)]
pub struct CompletionContext {
    pub was_idle: bool,
    pub timer_used: bool,
    pub duration: Option<u64>,
    pub minimum_duration_secs: u64,
}

pub fn detect(ctx: &CompletionContext) -> Vec<PatternFlag> {
    let mut flags = Vec::new();
    let never_started = !ctx.timer_used;

    if never_started && ctx.duration.is_some_and(|d| d < QUICK_COMPLETION_SECS) {
        flags.push(PatternFlag::CompletedVeryQuickly);
    }
    if never_started && ctx.was_idle {
        flags.push(PatternFlag::CompletedWithoutTimer);
    }
    if ctx
        .duration
        .is_some_and(|d| d < ctx.minimum_duration_secs)
    {
        flags.push(PatternFlag::BelowMinimumDuration);
    }

    flags
}

use chrono::{NaiveDate, TimeZone, Utc, Weekday};

use crate::error::{CadenceError, Conflict};
use crate::model::*;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_habit_creation_defaults() {
    let habit = Habit::new("alice".to_string(), "Read".to_string(), at());
    assert_eq!(habit.owner_id, "alice");
    assert_eq!(habit.category, "general");
    assert_eq!(habit.status, HabitStatus::Idle);
    assert_eq!(habit.streak, 0);
    assert_eq!(habit.days_per_week, 7);
    assert!(habit.is_active);
    assert!(habit.completion_history.is_empty());
    assert!(habit.last_completed.is_none());
}

#[test]
fn test_habit_from_input_normalizes() {
    let input = CreateHabitInput {
        category: Some("  Fitness ".to_string()),
        skip_days: vec![Weekday::Sun],
        ..CreateHabitInput::named("  Run 5k  ")
    };
    let habit = Habit::from_input("bob".to_string(), input, at());
    assert_eq!(habit.name, "Run 5k");
    assert_eq!(habit.category, "fitness");
    assert!(habit.is_rest_day(d(1)));
    assert!(!habit.is_rest_day(d(2)));
}

#[test]
fn test_normalize_category_default() {
    assert_eq!(normalize_category(None), "general");
    assert_eq!(normalize_category(Some("   ")), "general");
    assert_eq!(normalize_category(Some("Health")), "health");
}

#[test]
fn test_validate_create_input() {
    assert!(validate_create_input(&CreateHabitInput::named("Stretch")).is_ok());

    let empty = CreateHabitInput::named("   ");
    assert!(matches!(
        validate_create_input(&empty),
        Err(CadenceError::InvalidInput(_))
    ));

    let long = CreateHabitInput::named("x".repeat(MAX_NAME_LENGTH + 1));
    assert!(validate_create_input(&long).is_err());

    let too_long_session = CreateHabitInput {
        minimum_duration: Some(481),
        ..CreateHabitInput::named("Study")
    };
    assert!(validate_create_input(&too_long_session).is_err());

    let zero_minutes = CreateHabitInput {
        minimum_duration: Some(0),
        ..CreateHabitInput::named("Study")
    };
    assert!(validate_create_input(&zero_minutes).is_err());

    let bounds_ok = CreateHabitInput {
        minimum_duration: Some(480),
        ..CreateHabitInput::named("Study")
    };
    assert!(validate_create_input(&bounds_ok).is_ok());
}

#[test]
fn test_validate_days_and_skip_days() {
    let zero_days = CreateHabitInput {
        days_per_week: 0,
        ..CreateHabitInput::named("Walk")
    };
    assert!(validate_create_input(&zero_days).is_err());

    let dup = CreateHabitInput {
        skip_days: vec![Weekday::Sat, Weekday::Sat],
        ..CreateHabitInput::named("Walk")
    };
    assert!(validate_create_input(&dup).is_err());
}

#[test]
fn test_validate_update_input() {
    let ok = UpdateHabitInput {
        name: Some("New".into()),
        minimum_duration: Some(30),
        ..Default::default()
    };
    assert!(validate_update_input(&ok).is_ok());

    let bad = UpdateHabitInput {
        name: Some(String::new()),
        ..Default::default()
    };
    assert!(validate_update_input(&bad).is_err());
}

#[test]
fn test_apply_update() {
    let mut habit = Habit::new("alice".into(), "Read".into(), at());
    let input = UpdateHabitInput {
        name: Some(" Read fiction ".into()),
        category: Some("Leisure".into()),
        accountability_mode: Some(true),
        ..Default::default()
    };
    habit.apply_update(&input, at());
    assert_eq!(habit.name, "Read fiction");
    assert_eq!(habit.category, "leisure");
    assert!(habit.accountability_mode);
}

#[test]
fn test_status_serde_names() {
    assert_eq!(
        serde_json::to_string(&HabitStatus::InProgress).unwrap(),
        "\"in-progress\""
    );
    assert_eq!(
        serde_json::to_string(&HonestyStatus::NotReally).unwrap(),
        "\"not-really\""
    );
    assert_eq!(
        "not_really".parse::<HonestyStatus>().unwrap(),
        HonestyStatus::NotReally
    );
    assert_eq!(
        "In-Progress".parse::<HabitStatus>().unwrap(),
        HabitStatus::InProgress
    );
    assert!("done".parse::<CompletionStatus>().is_err());
}

#[test]
fn test_history_append_rejects_duplicate_day() {
    let mut history = CompletionHistory::new();
    history.append(CompletionEntry::completed(d(2), at())).unwrap();
    let err = history
        .append(CompletionEntry::skipped(d(2), at()))
        .unwrap_err();
    assert_eq!(
        err.as_conflict(),
        Some(&Conflict::DuplicateEntry { date: d(2) })
    );
    assert_eq!(history.len(), 1);
}

#[test]
fn test_history_find_and_remove() {
    let mut history = CompletionHistory::new();
    history.append(CompletionEntry::completed(d(2), at())).unwrap();
    history.append(CompletionEntry::skipped(d(3), at())).unwrap();

    assert_eq!(
        history.find_entry_for_date(d(3)).map(|e| e.status),
        Some(CompletionStatus::Skipped)
    );
    assert!(history.find_entry_for_date(d(4)).is_none());

    let removed = history.remove_for_date(d(2)).unwrap();
    assert_eq!(removed.date, d(2));
    assert!(matches!(
        history.remove_for_date(d(2)),
        Err(CadenceError::NotFound(_))
    ));
    assert_eq!(history.len(), 1);
}

#[test]
fn test_history_update_honesty() {
    let mut history = CompletionHistory::new();
    history.append(CompletionEntry::completed(d(2), at())).unwrap();
    history.update_honesty(d(2), HonestyStatus::Honest).unwrap();
    assert_eq!(
        history.find_entry_for_date(d(2)).unwrap().honesty_status,
        Some(HonestyStatus::Honest)
    );
    assert!(matches!(
        history.update_honesty(d(9), HonestyStatus::Honest),
        Err(CadenceError::NotFound(_))
    ));
}

#[test]
fn test_history_review_batch_skips_unmatched() {
    let mut history = CompletionHistory::new();
    history.append(CompletionEntry::completed(d(2), at())).unwrap();
    history.append(CompletionEntry::completed(d(3), at())).unwrap();

    let outcome = history.review_honesty(&[
        (d(2), HonestyStatus::Honest),
        (d(5), HonestyStatus::Honest),
        (d(3), HonestyStatus::NotReally),
    ]);
    assert_eq!(outcome.applied, vec![d(2), d(3)]);
    assert_eq!(outcome.unmatched, vec![d(5)]);
    assert_eq!(
        history.find_entry_for_date(d(3)).unwrap().honesty_status,
        Some(HonestyStatus::NotReally)
    );
}

#[test]
fn test_history_honesty_only_on_completed_days() {
    let mut history = CompletionHistory::new();
    history.append(CompletionEntry::completed(d(2), at())).unwrap();
    history.append(CompletionEntry::skipped(d(3), at())).unwrap();

    assert!(matches!(
        history.update_honesty(d(3), HonestyStatus::Honest),
        Err(CadenceError::InvalidInput(_))
    ));
    assert_eq!(history.find_entry_for_date(d(3)).unwrap().honesty_status, None);

    let outcome = history.review_honesty(&[
        (d(2), HonestyStatus::NotReally),
        (d(3), HonestyStatus::Honest),
    ]);
    assert_eq!(outcome.applied, vec![d(2)]);
    assert_eq!(outcome.unmatched, vec![d(3)]);
    assert_eq!(history.find_entry_for_date(d(3)).unwrap().honesty_status, None);
}

#[test]
fn test_validate_duration_bounds() {
    assert!(validate_duration(None).is_ok());
    assert!(validate_duration(Some(0)).is_ok());
    assert!(validate_duration(Some(MAX_COMPLETION_DURATION_SECS)).is_ok());
    assert!(matches!(
        validate_duration(Some(MAX_COMPLETION_DURATION_SECS + 1)),
        Err(CadenceError::InvalidInput(_))
    ));
    assert!(validate_duration(Some(u64::MAX)).is_err());
}

#[test]
fn test_history_skipped_in_week() {
    let mut history = CompletionHistory::new();
    // Tuesday
    history.append(CompletionEntry::skipped(d(3), at())).unwrap();
    assert!(history.skipped_in_week(d(8)).is_some()); // Sunday, same week
    assert!(history.skipped_in_week(d(9)).is_none()); // next Monday
    assert!(history.skipped_in_week(d(1)).is_none()); // previous Sunday
}

#[test]
fn test_normalize_reflection() {
    assert_eq!(normalize_reflection(None).unwrap(), None);
    assert_eq!(normalize_reflection(Some("   ")).unwrap(), None);
    assert!(normalize_reflection(Some(" abcd ")).is_err());
    assert_eq!(
        normalize_reflection(Some("  felt good ")).unwrap().as_deref(),
        Some("felt good")
    );
}

#[test]
fn test_habit_serde_roundtrip() {
    let mut habit = Habit::new("alice".into(), "Read".into(), at());
    habit
        .completion_history
        .append(
            CompletionEntry::completed(d(2), at())
                .with_duration(Some(300))
                .with_reflection(Some("chapter two".into())),
        )
        .unwrap();
    let json = serde_json::to_string(&habit).unwrap();
    let parsed: Habit = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.id, habit.id);
    assert_eq!(parsed.completion_history, habit.completion_history);
}

//! Service-level tests against a file-backed SQLite database, reopened
//! between steps to make sure nothing lives only in memory.

use std::path::PathBuf;
use std::sync::Arc;

use cadence_core::clock::ManualClock;
use cadence_core::error::{CadenceError, Conflict};
use cadence_core::model::{CompletionStatus, CreateHabitInput, HonestyStatus};
use cadence_core::service::{CompleteRequest, HabitService};
use cadence_core::storage::{SqliteStorage, StorageBackend};
use chrono::NaiveDate;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn temp_db() -> PathBuf {
    std::env::temp_dir()
        .join(format!("cadence-it-{}", uuid::Uuid::now_v7()))
        .join("cadence.db")
}

fn service(path: &PathBuf, clock: Arc<ManualClock>) -> HabitService<SqliteStorage> {
    let storage = SqliteStorage::open(path).expect("open sqlite");
    HabitService::new(storage, clock)
}

#[tokio::test]
async fn test_streak_survives_reopen() {
    let path = temp_db();
    let clock = Arc::new(ManualClock::at_local_noon(d(2026, 3, 2)));

    let id = {
        let svc = service(&path, clock.clone());
        let habit = svc
            .create_habit("alice", CreateHabitInput::named("Stretch"))
            .await
            .unwrap();
        svc.complete("alice", habit.id, CompleteRequest::default())
            .await
            .unwrap();
        habit.id
    };

    clock.advance_days(1);
    {
        let svc = service(&path, clock.clone());
        let (habit, outcome) = svc
            .complete("alice", id, CompleteRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome.streak, 2);
        assert_eq!(habit.completion_history.len(), 2);
    }

    clock.advance_days(1);
    {
        let svc = service(&path, clock.clone());
        let habit = svc.skip_day("alice", id, None).await.unwrap();
        assert_eq!(habit.streak, 3);
        assert_eq!(habit.last_completed, Some(d(2026, 3, 4)));
    }

    let svc = service(&path, clock.clone());
    let habit = svc.get_habit("alice", id).await.unwrap();
    let statuses: Vec<CompletionStatus> =
        habit.completion_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            CompletionStatus::Completed,
            CompletionStatus::Completed,
            CompletionStatus::Skipped
        ]
    );
    assert_eq!(habit.streak, 3);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_duplicate_completion_rejected_after_reopen() {
    let path = temp_db();
    let clock = Arc::new(ManualClock::at_local_noon(d(2026, 3, 2)));

    let id = {
        let svc = service(&path, clock.clone());
        let habit = svc
            .create_habit("bob", CreateHabitInput::named("Journal"))
            .await
            .unwrap();
        svc.complete("bob", habit.id, CompleteRequest::default())
            .await
            .unwrap();
        habit.id
    };

    let svc = service(&path, clock.clone());
    let err = svc
        .complete("bob", id, CompleteRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CadenceError::Conflict(Conflict::DuplicateEntry { .. })
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_honesty_and_delete_persist() {
    let path = temp_db();
    let clock = Arc::new(ManualClock::at_local_noon(d(2026, 3, 2)));

    let svc = service(&path, clock.clone());
    let habit = svc
        .create_habit(
            "carol",
            CreateHabitInput {
                accountability_mode: true,
                ..CreateHabitInput::named("Practice")
            },
        )
        .await
        .unwrap();
    svc.complete(
        "carol",
        habit.id,
        CompleteRequest {
            duration: Some(1_800),
            reflection: Some("scales and arpeggios".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(svc.pending_reviews("carol").await.unwrap().len(), 1);
    svc.set_honesty("carol", habit.id, d(2026, 3, 2), HonestyStatus::Honest)
        .await
        .unwrap();
    drop(svc);

    let svc = service(&path, clock.clone());
    assert!(svc.pending_reviews("carol").await.unwrap().is_empty());
    let reloaded = svc.get_habit("carol", habit.id).await.unwrap();
    let entry = reloaded
        .completion_history
        .find_entry_for_date(d(2026, 3, 2))
        .unwrap();
    assert_eq!(entry.honesty_status, Some(HonestyStatus::Honest));
    assert_eq!(entry.reflection.as_deref(), Some("scales and arpeggios"));

    svc.delete_habit("carol", habit.id).await.unwrap();
    assert!(matches!(
        svc.storage().get_habit(habit.id).await,
        Err(CadenceError::NotFound(_))
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

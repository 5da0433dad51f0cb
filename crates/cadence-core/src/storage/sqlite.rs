use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::StorageBackend;
use crate::error::{CadenceError, Conflict, Result};
use crate::model::*;

/// SQLite-backed storage for Cadence habits.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks.  All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Sets WAL journal mode and enables foreign keys, then creates all
    /// tables and indexes if they don't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CadenceError::Storage(format!("failed to create database directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(&path)
            .map_err(|e| CadenceError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CadenceError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    /// Shared initialisation: pragmas + table creation.
    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL mode for better concurrent-read performance.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| CadenceError::Storage(format!("failed to set WAL mode: {e}")))?;

        // Enforce foreign-key constraints.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| CadenceError::Storage(format!("failed to enable foreign keys: {e}")))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        storage.create_tables()?;
        Ok(storage)
    }

    /// Create all tables and indexes (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CadenceError::Storage(format!("failed to acquire database lock: {e}")))?;

        // (habit_id, date) is the primary key of an entry: one entry per
        // calendar day is enforced by the store as well as by the model.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS habits (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'general',
                status TEXT NOT NULL DEFAULT 'idle',
                started_at TEXT,
                paused_duration INTEGER NOT NULL DEFAULT 0,
                streak INTEGER NOT NULL DEFAULT 0,
                last_completed TEXT,
                days_per_week INTEGER NOT NULL DEFAULT 7,
                skip_days TEXT NOT NULL DEFAULT '[]',
                minimum_duration INTEGER NOT NULL DEFAULT 10,
                accountability_mode INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS completion_entries (
                habit_id TEXT NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                position INTEGER NOT NULL,
                status TEXT NOT NULL,
                duration INTEGER,
                reflection TEXT,
                honesty_status TEXT,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (habit_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_habits_status ON habits(owner_id, status);
            CREATE INDEX IF NOT EXISTS idx_entries_position ON completion_entries(habit_id, position);
            ",
        )
        .map_err(|e| CadenceError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.  This is the primary way trait methods
    /// interact with the database.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                CadenceError::Storage(format!("failed to acquire database lock: {e}"))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| CadenceError::Storage(format!("task join error: {e}")))?
    }
}

const HABIT_COLUMNS: &str = "id, owner_id, name, description, category, status, started_at, \
     paused_duration, streak, last_completed, days_per_week, skip_days, minimum_duration, \
     accountability_mode, is_active, created_at, updated_at";

/// Raw `habits` row, converted to a [`Habit`] outside the rusqlite closure so
/// parse failures surface as [`CadenceError`]s.
struct HabitRow {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    category: String,
    status: String,
    started_at: Option<String>,
    paused_duration: i64,
    streak: i64,
    last_completed: Option<String>,
    days_per_week: i64,
    skip_days: String,
    minimum_duration: i64,
    accountability_mode: bool,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl HabitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            category: row.get(4)?,
            status: row.get(5)?,
            started_at: row.get(6)?,
            paused_duration: row.get(7)?,
            streak: row.get(8)?,
            last_completed: row.get(9)?,
            days_per_week: row.get(10)?,
            skip_days: row.get(11)?,
            minimum_duration: row.get(12)?,
            accountability_mode: row.get(13)?,
            is_active: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_habit(self, history: CompletionHistory) -> Result<Habit> {
        let skip_days: Vec<Weekday> = serde_json::from_str(&self.skip_days)?;
        Ok(Habit {
            id: parse_uuid(&self.id)?,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            category: self.category,
            status: self.status.parse().map_err(CadenceError::Storage)?,
            started_at: self.started_at.as_deref().map(parse_ts).transpose()?,
            paused_duration: secs_from_sql(self.paused_duration)?,
            streak: self.streak.max(0) as u32,
            last_completed: self.last_completed.as_deref().map(parse_date).transpose()?,
            completion_history: history,
            days_per_week: self.days_per_week.clamp(1, 7) as u8,
            skip_days,
            minimum_duration: self.minimum_duration.max(0) as u32,
            accountability_mode: self.accountability_mode,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

struct EntryRow {
    date: String,
    status: String,
    duration: Option<i64>,
    reflection: Option<String>,
    honesty_status: Option<String>,
    recorded_at: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            status: row.get(1)?,
            duration: row.get(2)?,
            reflection: row.get(3)?,
            honesty_status: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<CompletionEntry> {
        Ok(CompletionEntry {
            date: parse_date(&self.date)?,
            status: self.status.parse().map_err(CadenceError::Storage)?,
            duration: self.duration.map(secs_from_sql).transpose()?,
            reflection: self.reflection,
            honesty_status: self
                .honesty_status
                .map(|h| h.parse().map_err(CadenceError::Storage))
                .transpose()?,
            recorded_at: parse_ts(&self.recorded_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| CadenceError::Storage(format!("invalid id '{s}': {e}")))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CadenceError::Storage(format!("invalid timestamp '{s}': {e}")))
}

fn secs_to_sql(secs: u64) -> Result<i64> {
    i64::try_from(secs)
        .map_err(|_| CadenceError::Storage(format!("duration {secs}s out of range")))
}

fn secs_from_sql(secs: i64) -> Result<u64> {
    u64::try_from(secs)
        .map_err(|_| CadenceError::Storage(format!("invalid stored duration {secs}")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    s.parse::<NaiveDate>()
        .map_err(|e| CadenceError::Storage(format!("invalid date '{s}': {e}")))
}

fn load_history(conn: &Connection, habit_id: &str) -> Result<CompletionHistory> {
    let mut stmt = conn
        .prepare(
            "SELECT date, status, duration, reflection, honesty_status, recorded_at
             FROM completion_entries WHERE habit_id = ?1 ORDER BY position",
        )
        .map_err(|e| CadenceError::Storage(format!("failed to prepare entry query: {e}")))?;
    let rows = stmt
        .query_map(params![habit_id], EntryRow::from_row)
        .map_err(|e| CadenceError::Storage(format!("failed to query entries: {e}")))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| CadenceError::Storage(format!("failed to read entries: {e}")))?;

    let entries = rows
        .into_iter()
        .map(EntryRow::into_entry)
        .collect::<Result<Vec<_>>>()?;
    Ok(entries.into())
}

fn load_habits(conn: &Connection, rows: Vec<HabitRow>) -> Result<Vec<Habit>> {
    rows.into_iter()
        .map(|row| {
            let history = load_history(conn, &row.id)?;
            row.into_habit(history)
        })
        .collect()
}

fn write_habit(conn: &Connection, habit: &Habit) -> Result<()> {
    let paused_duration = secs_to_sql(habit.paused_duration)?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| CadenceError::Storage(format!("failed to begin transaction: {e}")))?;

    let id = habit.id.to_string();
    let skip_days = serde_json::to_string(&habit.skip_days)?;
    tx.execute(
        "INSERT INTO habits (id, owner_id, name, description, category, status, started_at,
             paused_duration, streak, last_completed, days_per_week, skip_days, minimum_duration,
             accountability_mode, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             category = excluded.category,
             status = excluded.status,
             started_at = excluded.started_at,
             paused_duration = excluded.paused_duration,
             streak = excluded.streak,
             last_completed = excluded.last_completed,
             days_per_week = excluded.days_per_week,
             skip_days = excluded.skip_days,
             minimum_duration = excluded.minimum_duration,
             accountability_mode = excluded.accountability_mode,
             is_active = excluded.is_active,
             updated_at = excluded.updated_at",
        params![
            id,
            habit.owner_id,
            habit.name,
            habit.description,
            habit.category,
            habit.status.to_string(),
            habit.started_at.map(|t| t.to_rfc3339()),
            paused_duration,
            i64::from(habit.streak),
            habit.last_completed.map(|d| d.to_string()),
            i64::from(habit.days_per_week),
            skip_days,
            i64::from(habit.minimum_duration),
            habit.accountability_mode,
            habit.is_active,
            habit.created_at.to_rfc3339(),
            habit.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| CadenceError::Storage(format!("failed to save habit: {e}")))?;

    tx.execute(
        "DELETE FROM completion_entries WHERE habit_id = ?1",
        params![id],
    )
    .map_err(|e| CadenceError::Storage(format!("failed to clear entries: {e}")))?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO completion_entries
                     (habit_id, date, position, status, duration, reflection, honesty_status, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| CadenceError::Storage(format!("failed to prepare entry insert: {e}")))?;

        for (position, entry) in habit.completion_history.iter().enumerate() {
            let duration = entry.duration.map(secs_to_sql).transpose()?;
            stmt.execute(params![
                id,
                entry.date.to_string(),
                position as i64,
                entry.status.to_string(),
                duration,
                entry.reflection,
                entry.honesty_status.map(|h| h.to_string()),
                entry.recorded_at.to_rfc3339(),
            ])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref f, _)
                    if f.code == ErrorCode::ConstraintViolation =>
                {
                    CadenceError::Conflict(Conflict::DuplicateEntry { date: entry.date })
                }
                other => CadenceError::Storage(format!("failed to save entry: {other}")),
            })?;
        }
    }

    tx.commit()
        .map_err(|e| CadenceError::Storage(format!("failed to commit habit: {e}")))?;
    Ok(())
}

impl StorageBackend for SqliteStorage {
    async fn save_habit(&self, habit: &Habit) -> Result<()> {
        let habit = habit.clone();
        self.with_conn(move |conn| write_habit(conn, &habit)).await
    }

    async fn get_habit(&self, id: Uuid) -> Result<Habit> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1");
            let row = conn
                .query_row(&sql, params![id.to_string()], HabitRow::from_row)
                .optional()
                .map_err(|e| CadenceError::Storage(format!("failed to load habit: {e}")))?
                .ok_or_else(|| CadenceError::NotFound(format!("habit {id}")))?;
            let history = load_history(conn, &row.id)?;
            row.into_habit(history)
        })
        .await
    }

    async fn list_habits(&self, query: &HabitQuery) -> Result<Vec<Habit>> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {HABIT_COLUMNS} FROM habits
                 WHERE owner_id = ?1
                   AND (?2 OR is_active = 1)
                   AND (?3 IS NULL OR category = ?3)
                 ORDER BY created_at, id"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CadenceError::Storage(format!("failed to prepare habit query: {e}")))?;
            let category = query.category.as_deref().map(str::to_lowercase);
            let rows = stmt
                .query_map(
                    params![query.owner_id, query.include_inactive, category],
                    HabitRow::from_row,
                )
                .map_err(|e| CadenceError::Storage(format!("failed to query habits: {e}")))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| CadenceError::Storage(format!("failed to read habits: {e}")))?;
            load_habits(conn, rows)
        })
        .await
    }

    async fn find_in_progress(&self, owner_id: &str) -> Result<Option<Habit>> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {HABIT_COLUMNS} FROM habits
                 WHERE owner_id = ?1 AND status = 'in-progress' AND is_active = 1
                 LIMIT 1"
            );
            let row = conn
                .query_row(&sql, params![owner_id], HabitRow::from_row)
                .optional()
                .map_err(|e| CadenceError::Storage(format!("failed to query habits: {e}")))?;
            match row {
                Some(row) => {
                    let history = load_history(conn, &row.id)?;
                    row.into_habit(history).map(Some)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_habit(&self, id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM habits WHERE id = ?1", params![id.to_string()])
                .map_err(|e| CadenceError::Storage(format!("failed to delete habit: {e}")))?;
            if deleted == 0 {
                return Err(CadenceError::NotFound(format!("habit {id}")));
            }
            Ok(())
        })
        .await
    }
}

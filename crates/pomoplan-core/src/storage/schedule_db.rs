//! SQLite-based storage for tasks and committed day schedules.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError, Result};
use crate::priority::PriorityClass;
use crate::schedule::{DaySchedule, Slot, SlotKind, SlotStatus};
use crate::store::{DayPersistence, TaskStore};
use crate::task::Task;

// === Helper Functions ===

fn corrupt(table: &'static str, message: impl Into<String>) -> DatabaseError {
    DatabaseError::CorruptRow {
        table,
        message: message.into(),
    }
}

/// Parse a calendar date stored as `YYYY-MM-DD`
fn parse_date(table: &'static str, value: &str) -> Result<NaiveDate, DatabaseError> {
    value
        .parse()
        .map_err(|_| corrupt(table, format!("bad date '{value}'")))
}

/// Parse an RFC 3339 timestamp
fn parse_datetime(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt("tasks", format!("bad timestamp '{value}'")))
}

fn format_version(version: u64) -> Result<i64, DatabaseError> {
    i64::try_from(version).map_err(|_| corrupt("day_schedules", "version overflow"))
}

/// Raw `tasks` row, decoded outside the rusqlite row closure so bad values
/// surface as [`DatabaseError::CorruptRow`].
struct TaskRow {
    id: String,
    title: String,
    priority: String,
    total_work_units: u32,
    completed_work_units: u32,
    due_date: Option<String>,
    auto_schedule: bool,
    project_ref: Option<String>,
    created_at: String,
}

const TASK_COLUMNS: &str = "id, title, priority, total_work_units, completed_work_units,
     due_date, auto_schedule, project_ref, created_at";

impl TaskRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            priority: row.get(2)?,
            total_work_units: row.get(3)?,
            completed_work_units: row.get(4)?,
            due_date: row.get(5)?,
            auto_schedule: row.get(6)?,
            project_ref: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_task(self) -> Result<Task, DatabaseError> {
        let priority: PriorityClass = self
            .priority
            .parse()
            .map_err(|_| corrupt("tasks", format!("bad priority '{}'", self.priority)))?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|d| parse_date("tasks", d))
            .transpose()?;
        Ok(Task {
            id: self.id,
            title: self.title,
            priority,
            total_work_units: self.total_work_units,
            completed_work_units: self.completed_work_units,
            due_date,
            auto_schedule: self.auto_schedule,
            project_ref: self.project_ref,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct SlotRow {
    id: String,
    date: String,
    task_id: Option<String>,
    start_minute: u32,
    kind: String,
    duration_minutes: u32,
    status: String,
}

impl SlotRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            task_id: row.get(2)?,
            start_minute: row.get(3)?,
            kind: row.get(4)?,
            duration_minutes: row.get(5)?,
            status: row.get(6)?,
        })
    }

    fn into_slot(self) -> Result<Slot, DatabaseError> {
        let kind = SlotKind::parse(&self.kind)
            .ok_or_else(|| corrupt("slots", format!("bad kind '{}'", self.kind)))?;
        let status = SlotStatus::parse(&self.status)
            .ok_or_else(|| corrupt("slots", format!("bad status '{}'", self.status)))?;
        Ok(Slot {
            date: parse_date("slots", &self.date)?,
            id: self.id,
            task_id: self.task_id,
            start_minute: self.start_minute,
            kind,
            duration_minutes: self.duration_minutes,
            status,
        })
    }
}

/// SQLite database for tasks and day schedules.
///
/// Implements both [`TaskStore`] and [`DayPersistence`], so one file backs the
/// whole planner.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open the database at `<data dir>/pomoplan.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir()?;
        Self::open_at(&dir.join("pomoplan.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        // Base tables (v1 schema) first
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS tasks (
                id                    TEXT PRIMARY KEY,
                title                 TEXT NOT NULL,
                priority              TEXT NOT NULL,
                total_work_units      INTEGER NOT NULL,
                completed_work_units  INTEGER NOT NULL DEFAULT 0,
                due_date              TEXT,
                auto_schedule         INTEGER NOT NULL DEFAULT 1,
                created_at            TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS day_schedules (
                date     TEXT PRIMARY KEY,
                version  INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS slots (
                id                TEXT PRIMARY KEY,
                date              TEXT NOT NULL REFERENCES day_schedules(date) ON DELETE CASCADE,
                task_id           TEXT,
                start_minute      INTEGER NOT NULL,
                kind              TEXT NOT NULL,
                duration_minutes  INTEGER NOT NULL,
                status            TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_slots_date ON slots(date);",
        )?;
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    fn query_tasks(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }
}

impl TaskStore for ScheduleDb {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at, id");
        Ok(self.query_tasks(&sql, [])?)
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        Ok(self.query_tasks(&sql, [id])?.pop())
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        self.conn.execute(
            "INSERT INTO tasks (id, title, priority, total_work_units, completed_work_units,
                                due_date, auto_schedule, project_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                priority = excluded.priority,
                total_work_units = excluded.total_work_units,
                completed_work_units = excluded.completed_work_units,
                due_date = excluded.due_date,
                auto_schedule = excluded.auto_schedule,
                project_ref = excluded.project_ref",
            params![
                task.id,
                task.title,
                task.priority.as_str(),
                task.total_work_units,
                task.completed_work_units,
                task.due_date.map(|d| d.to_string()),
                task.auto_schedule,
                task.project_ref,
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn record_completed_unit(&self, task_id: &str) -> Result<Task> {
        self.conn.execute(
            "UPDATE tasks
             SET completed_work_units = MIN(completed_work_units + 1, total_work_units)
             WHERE id = ?1",
            [task_id],
        )?;
        self.get_task(task_id)?
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }
}

impl DayPersistence for ScheduleDb {
    fn load_day(&self, date: NaiveDate) -> Result<Option<DaySchedule>, DatabaseError> {
        let key = date.to_string();
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM day_schedules WHERE date = ?1",
                [&key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(version) = version else {
            return Ok(None);
        };
        let version = u64::try_from(version).map_err(|_| corrupt("day_schedules", "negative version"))?;

        let mut stmt = self.conn.prepare(
            "SELECT id, date, task_id, start_minute, kind, duration_minutes, status
             FROM slots WHERE date = ?1 ORDER BY start_minute",
        )?;
        let rows = stmt
            .query_map([&key], SlotRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let slots = rows
            .into_iter()
            .map(SlotRow::into_slot)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(DaySchedule::from_slots(date, version, slots)))
    }

    fn save_days(&self, days: &[DaySchedule]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;

        // Clear every date first: a slot moving between two of these days
        // keeps its id and must not collide with its old row.
        for day in days {
            tx.execute("DELETE FROM slots WHERE date = ?1", [day.date.to_string()])?;
        }
        for day in days {
            let key = day.date.to_string();
            tx.execute(
                "INSERT INTO day_schedules (date, version) VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET version = excluded.version",
                params![key, format_version(day.version)?],
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO slots (id, date, task_id, start_minute, kind, duration_minutes, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for slot in day.iter() {
                insert.execute(params![
                    slot.id,
                    key,
                    slot.task_id,
                    slot.start_minute,
                    slot.kind.as_str(),
                    slot.duration_minutes,
                    slot.status.as_str(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn find_slot_date(&self, slot_id: &str) -> Result<Option<NaiveDate>, DatabaseError> {
        let date: Option<String> = self
            .conn
            .query_row("SELECT date FROM slots WHERE id = ?1", [slot_id], |row| row.get(0))
            .optional()?;
        date.map(|d| parse_date("slots", &d)).transpose()
    }

    fn dates_with_task(&self, task_id: &str) -> Result<Vec<NaiveDate>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT date FROM slots WHERE task_id = ?1 ORDER BY date")?;
        let dates = stmt
            .query_map([task_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        dates.iter().map(|d| parse_date("slots", d)).collect()
    }
}

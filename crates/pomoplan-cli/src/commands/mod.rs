//! Subcommand implementations and the helpers they share.

pub mod config;
pub mod day;
pub mod plan;
pub mod slot;
pub mod task;

use std::error::Error;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use pomoplan_core::{format_clock, Config, Planner, ScheduleDb, ScheduleStore, Slot, TaskStore};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Everything a command needs: the task database and a planner over the
/// persisted schedule.
pub struct Session {
    pub db: ScheduleDb,
    pub planner: Planner,
}

impl Session {
    pub fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let db = ScheduleDb::open()?;
        let store = Arc::new(ScheduleStore::with_persistence(ScheduleDb::open()?));
        let planner = Planner::new(store, &config);
        Ok(Self { db, planner })
    }
}

pub fn parse_date(value: &str) -> CliResult<NaiveDate> {
    value
        .parse()
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD").into())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `--at` override or the local wall clock.
pub fn now_or(at: Option<&str>) -> CliResult<NaiveDateTime> {
    match at {
        Some(value) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
            .map_err(|_| format!("invalid time '{value}', expected YYYY-MM-DDTHH:MM").into()),
        None => Ok(Local::now().naive_local()),
    }
}

/// One human-readable line per slot.
pub fn print_slot(slot: &Slot, tasks: &dyn TaskStore) {
    let owner = match slot.task_id.as_deref() {
        Some(id) => match tasks.get_task(id) {
            Ok(Some(task)) => task.title,
            _ => id.to_string(),
        },
        None => String::new(),
    };
    println!(
        "{}-{}  {:<11}  {:<11}  {:<24}  {}",
        format_clock(slot.start_minute),
        format_clock(slot.end_minute()),
        slot.kind.as_str(),
        slot.status.as_str(),
        owner,
        slot.id
    );
}

//! Core error types for pomoplan-core.
//!
//! Each concern gets its own thiserror enum; [`CoreError`] aggregates them so
//! callers that do not care about the distinction can use `?` throughout.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::lifecycle::LifecycleAction;
use crate::schedule::SlotStatus;

/// Core error type for pomoplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Rejected slot status change
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Rejected manual move
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Rejected schedule commit
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Referenced task does not exist in the task store
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: &'static str, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange { start: String, end: String },

    /// Unparseable clock time
    #[error("Invalid clock time '{0}', expected HH:MM")]
    InvalidClockTime(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors raised by the slot lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid transition for slot {slot_id}: cannot {action} from {from} ({reason})")]
    InvalidTransition {
        slot_id: String,
        from: SlotStatus,
        action: LifecycleAction,
        reason: String,
    },

    #[error("Slot not found: {0}")]
    SlotNotFound(String),
}

/// Errors raised by the conflict resolver when a manual move cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Slot {slot_id} would occupy {start}..{end} minutes, outside working hours {window_start}..{window_end}")]
    OutsideWorkingHours {
        slot_id: String,
        start: u32,
        end: u32,
        window_start: u32,
        window_end: u32,
    },

    #[error("{0} is not a working day")]
    NonWorkingDay(NaiveDate),

    #[error("Conflict unresolvable: slot {slot_id} cannot be placed within working hours")]
    Unresolvable { slot_id: String },

    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Slot {slot_id} is {status} and cannot be moved")]
    SlotLocked { slot_id: String, status: SlotStatus },

    #[error("Move targets {requested} but the schedule given is for {schedule}")]
    DateMismatch {
        requested: NaiveDate,
        schedule: NaiveDate,
    },
}

/// Errors raised by the schedule store on commit.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Optimistic concurrency check failed; re-read and retry.
    #[error("Stale schedule for {date}: read version {expected}, current version {found}")]
    StaleSchedule {
        date: NaiveDate,
        expected: u64,
        found: u64,
    },

    /// The replacement schedule violates a day invariant.
    #[error("Invalid schedule for {date}: {message}")]
    InvalidSchedule { date: NaiveDate, message: String },

    /// The persistence backend rejected the write; nothing was committed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

//! # Pomoplan Core Library
//!
//! This library provides the core logic for the Pomoplan daily pomodoro
//! scheduler. Every operation is available through the standalone `pomoplan`
//! CLI, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Allocator**: a deterministic greedy pass that packs tasks' work units
//!   and breaks into free working time, most urgent first
//! - **Conflict resolver**: applies manual moves and pushes whatever they land
//!   on forward, failing atomically when the day cannot absorb it
//! - **Lifecycle**: the scheduled → in progress → completed / missed state machine
//! - **Store**: versioned day schedules with all-or-nothing commits
//! - **Storage**: SQLite task and schedule persistence, TOML configuration
//!
//! ## Key Components
//!
//! - [`Allocator`]: places work units for a date range
//! - [`ConflictResolver`]: resolves manual slot moves
//! - [`ScheduleStore`]: owner of committed [`DaySchedule`]s
//! - [`Planner`]: ties the above together for front-ends
//! - [`ScheduleDb`]: task and schedule persistence
//! - [`Config`]: application configuration management

pub mod conflict;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod planner;
pub mod priority;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod task;

pub use conflict::{find_overlaps, ConflictResolver, SlotMove};
pub use error::{
    ConfigError, ConflictError, CoreError, DatabaseError, LifecycleError, Result, StoreError,
    ValidationError,
};
pub use events::Event;
pub use lifecycle::{overdue_slots, LifecycleAction, TaskEffect, Transition};
pub use planner::{ActionOutcome, MoveOutcome, PlanOutcome, Planner};
pub use priority::{PriorityClass, PriorityProfile};
pub use schedule::{
    format_clock, parse_clock, DateRange, DaySchedule, Slot, SlotKind, SlotStatus, TimeWindow,
    WorkingHours,
};
pub use scheduler::{
    AllocationResult, Allocator, SchedulerConfig, TaskAllocation, Unscheduled, UnscheduledReason,
};
pub use storage::{data_dir, Config, ScheduleDb};
pub use store::{DayPersistence, ScheduleStore, TaskStore};
pub use task::Task;

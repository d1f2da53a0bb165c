//! Automatic placement of pomodoro work units.
//!
//! The allocator is a deterministic greedy pass:
//! - Filters tasks that are opted in and still have unplaced units
//! - Orders them by priority class, due date and creation time
//! - Walks each task's eligible days (bounded by its priority's max delay)
//!   and packs work units into free capacity, breaks in between
//! - Reports whatever did not fit instead of failing the run
//!
//! It never touches the schedule store. Callers merge the result into the day
//! snapshots they read and commit those.

mod capacity;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::schedule::{DateRange, DaySchedule, Slot, SlotKind, WorkingHours};
use crate::task::Task;
use capacity::DayPlanner;

/// Allocator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Work unit length (minutes)
    #[serde(default = "default_session_duration")]
    pub session_duration_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    /// Consecutive work units before a long break replaces a short one
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    /// Hard cap on how many days ahead anything is placed
    #[serde(default = "default_planning_horizon_days")]
    pub planning_horizon_days: u32,
    /// Transition buffer after a task's last unit of the day (0 disables)
    #[serde(default)]
    pub buffer_minutes: u32,
}

fn default_session_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_sessions_until_long_break() -> u32 {
    4
}
fn default_planning_horizon_days() -> u32 {
    14
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            session_duration_minutes: default_session_duration(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            sessions_until_long_break: default_sessions_until_long_break(),
            planning_horizon_days: default_planning_horizon_days(),
            buffer_minutes: 0,
        }
    }
}

impl SchedulerConfig {
    /// Duration of a break of the given kind.
    pub fn break_minutes(&self, kind: SlotKind) -> u32 {
        match kind {
            SlotKind::ShortBreak => self.short_break_minutes,
            SlotKind::LongBreak => self.long_break_minutes,
            SlotKind::Buffer => self.buffer_minutes,
            SlotKind::Work => 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("session_duration_minutes", self.session_duration_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("sessions_until_long_break", self.sessions_until_long_break),
            ("planning_horizon_days", self.planning_horizon_days),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

/// Why some of a task's units were left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// Eligible working days were examined but had no room.
    InsufficientCapacity,
    /// The task's allowed delay reached no working day inside the horizon.
    HorizonExceeded,
}

impl UnscheduledReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientCapacity => "insufficient_capacity",
            Self::HorizonExceeded => "horizon_exceeded",
        }
    }
}

/// Units of one task that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unscheduled {
    pub task_id: String,
    pub remaining_units: u32,
    pub reason: UnscheduledReason,
    /// The task's class had to land today.
    pub urgent: bool,
}

/// What the run did for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAllocation {
    pub task_id: String,
    /// Units that were still unplaced before the run
    pub requested_units: u32,
    pub placed_units: u32,
    /// Work slots placed for the task, in time order
    pub slot_ids: Vec<String>,
}

/// Output of one allocator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// New slots (work, breaks, buffers) sorted by date and start
    pub placed_slots: Vec<Slot>,
    pub unscheduled: Vec<Unscheduled>,
    pub allocations: Vec<TaskAllocation>,
}

impl AllocationResult {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }

    /// Unplaced units of tasks that had to land today.
    pub fn urgent_unscheduled(&self) -> impl Iterator<Item = &Unscheduled> {
        self.unscheduled.iter().filter(|u| u.urgent)
    }

    pub fn slots_on(&self, date: NaiveDate) -> impl Iterator<Item = &Slot> {
        self.placed_slots.iter().filter(move |s| s.date == date)
    }

    pub fn work_units_placed(&self) -> usize {
        self.placed_slots.iter().filter(|s| s.is_work()).count()
    }

    /// Merge the placed slots into copies of `base`.
    ///
    /// Returns every day of `base` plus any new date that received slots, each
    /// validated against the day invariants. Versions are carried over from
    /// `base` so the store can detect stale commits.
    ///
    /// # Errors
    /// Returns an error if a merged day would contain overlapping slots.
    pub fn merge_into(
        &self,
        base: &BTreeMap<NaiveDate, DaySchedule>,
    ) -> Result<BTreeMap<NaiveDate, DaySchedule>, ValidationError> {
        let mut merged = base.clone();
        for slot in &self.placed_slots {
            merged
                .entry(slot.date)
                .or_insert_with(|| DaySchedule::new(slot.date))
                .insert(slot.clone());
        }
        for day in merged.values() {
            day.validate()?;
        }
        Ok(merged)
    }
}

/// Greedy pomodoro allocator.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    config: SchedulerConfig,
}

impl Allocator {
    /// Create a new allocator with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Place the remaining units of `tasks` into `horizon`.
    ///
    /// # Arguments
    /// * `tasks` - Candidate tasks; only opted-in, unfinished ones are used
    /// * `horizon` - Dates to plan; `horizon.start` is treated as today
    /// * `existing` - Committed day schedules; their slots are obstacles and
    ///   their pending work slots count as already placed
    /// * `working_hours` - Daily working window and work days
    pub fn schedule(
        &self,
        tasks: &[Task],
        horizon: DateRange,
        existing: &BTreeMap<NaiveDate, DaySchedule>,
        working_hours: &WorkingHours,
    ) -> AllocationResult {
        let today = horizon.start;
        let planning_end = today
            + Duration::days(i64::from(self.config.planning_horizon_days.max(1) - 1));
        let last_day = horizon.end.min(planning_end);

        let mut planners: BTreeMap<NaiveDate, DayPlanner<'_>> = DateRange::new(today, last_day)
            .map(|range| range.days().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|date| {
                let window = working_hours.window_for(date)?;
                Some((date, DayPlanner::new(date, window, existing.get(&date), &self.config)))
            })
            .collect();

        let mut result = AllocationResult::default();

        for task in self.ordered_candidates(tasks) {
            let already_pending: usize = existing
                .values()
                .map(|day| day.pending_work_for(&task.id))
                .sum();
            let requested = task
                .remaining_units()
                .saturating_sub(already_pending as u32);
            if requested == 0 {
                continue;
            }

            let task_last_day = last_day
                .min(today + Duration::days(i64::from(task.priority.max_delay_days())));
            let mut left = requested;
            let mut examined_any = false;
            let mut slot_ids = Vec::new();

            for (date, planner) in planners.range_mut(today..=task_last_day) {
                examined_any = true;
                let mut last_work: Option<Slot> = None;
                while left > 0 {
                    let Some(placed) = planner.place_unit(&task.id) else {
                        break;
                    };
                    for slot in placed {
                        if slot.is_work() {
                            slot_ids.push(slot.id.clone());
                            last_work = Some(slot.clone());
                        }
                        result.placed_slots.push(slot);
                    }
                    left -= 1;
                }
                if let Some(work) = last_work {
                    if let Some(buffer) = planner.place_buffer(&work, &task.id) {
                        result.placed_slots.push(buffer);
                    }
                }
                debug!(task_id = %task.id, %date, left, "placed work units");
                if left == 0 {
                    break;
                }
            }

            if left > 0 {
                let reason = if examined_any {
                    UnscheduledReason::InsufficientCapacity
                } else {
                    UnscheduledReason::HorizonExceeded
                };
                debug!(task_id = %task.id, left, reason = reason.as_str(), "units left unscheduled");
                result.unscheduled.push(Unscheduled {
                    task_id: task.id.clone(),
                    remaining_units: left,
                    reason,
                    urgent: task.priority.is_same_day(),
                });
            }

            result.allocations.push(TaskAllocation {
                task_id: task.id.clone(),
                requested_units: requested,
                placed_units: requested - left,
                slot_ids,
            });
        }

        result
            .placed_slots
            .sort_by(|a, b| (a.date, a.start_minute).cmp(&(b.date, b.start_minute)));

        info!(
            placed = result.work_units_placed(),
            unscheduled = result.unscheduled.len(),
            days = planners.len(),
            "allocation finished"
        );
        result
    }

    /// Schedulable tasks in placement order.
    ///
    /// Sorting is stable, so input order breaks any remaining tie.
    fn ordered_candidates<'t>(&self, tasks: &'t [Task]) -> Vec<&'t Task> {
        let mut candidates: Vec<&Task> = tasks.iter().filter(|t| t.is_schedulable()).collect();
        candidates.sort_by(|a, b| {
            a.priority
                .sort_order()
                .cmp(&b.priority.sort_order())
                .then_with(|| compare_due_dates(a.due_date, b.due_date))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        candidates
    }
}

/// Earlier due dates first; tasks without one go last.
fn compare_due_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

//! Entry point for front-ends: plan, move, and act on slots.
//!
//! Each operation reads snapshots from the [`ScheduleStore`], runs one of the
//! pure components (allocator, conflict resolver, lifecycle) and commits the
//! replacement days in one step. A stale read surfaces as
//! [`StoreError::StaleSchedule`](crate::error::StoreError::StaleSchedule); the
//! caller retries with fresh data.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::conflict::{ConflictResolver, SlotMove};
use crate::error::{ConflictError, CoreError, LifecycleError, Result};
use crate::events::Event;
use crate::lifecycle::{self, LifecycleAction, TaskEffect, Transition};
use crate::schedule::{DateRange, DaySchedule, Slot, SlotStatus, WorkingHours};
use crate::scheduler::{AllocationResult, Allocator, SchedulerConfig};
use crate::storage::Config;
use crate::store::{ScheduleStore, TaskStore};
use crate::task::Task;

/// What a planning run committed.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub result: AllocationResult,
    /// Days written to the store, with their new versions
    pub committed: Vec<DaySchedule>,
    pub events: Vec<Event>,
}

/// A move that was applied.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Replacement days (one, or source and target for a cross-date move)
    pub committed: Vec<DaySchedule>,
    pub event: Event,
}

/// A lifecycle action that was applied.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub transition: Transition,
    /// The task after its completed count went up, for completed work slots
    pub task: Option<Task>,
}

pub struct Planner {
    store: Arc<ScheduleStore>,
    allocator: Allocator,
    resolver: ConflictResolver,
}

impl Planner {
    pub fn new(store: Arc<ScheduleStore>, config: &Config) -> Self {
        Self::with_parts(store, config.scheduler.clone(), config.working_hours.clone())
    }

    pub fn with_parts(
        store: Arc<ScheduleStore>,
        scheduler: SchedulerConfig,
        working_hours: WorkingHours,
    ) -> Self {
        Self {
            store,
            allocator: Allocator::with_config(scheduler),
            resolver: ConflictResolver::new(working_hours),
        }
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn working_hours(&self) -> &WorkingHours {
        self.resolver.working_hours()
    }

    pub fn day(&self, date: NaiveDate) -> Result<DaySchedule> {
        Ok(self.store.get_day(date)?)
    }

    /// Allocate the remaining units of `tasks` over `horizon` and commit.
    ///
    /// With `replace_pending`, slots still `scheduled` on the horizon's dates
    /// are dropped first and re-planned from scratch. Pending work on dates
    /// outside the horizon always counts as already placed.
    pub fn plan(
        &self,
        tasks: &[Task],
        horizon: DateRange,
        replace_pending: bool,
        now: NaiveDateTime,
    ) -> Result<PlanOutcome> {
        let mut snapshot = self.store.days_in(horizon)?;
        for task in tasks {
            for date in self.store.dates_with_task(&task.id)? {
                if !snapshot.contains_key(&date) {
                    snapshot.insert(date, self.store.get_day(date)?);
                }
            }
        }

        let mut base: BTreeMap<NaiveDate, DaySchedule> = snapshot
            .iter()
            .map(|(date, day)| {
                let day = if replace_pending && horizon.contains(*date) {
                    day.without_pending()
                } else {
                    day.clone()
                };
                (*date, day)
            })
            .collect();
        let trimmed: usize = tasks.iter().map(|t| trim_surplus(&mut base, t)).sum();

        let result = self
            .allocator
            .schedule(tasks, horizon, &base, self.working_hours());
        let merged = result.merge_into(&base)?;

        let changed: Vec<DaySchedule> = merged
            .into_iter()
            .filter(|(date, day)| snapshot.get(date) != Some(day))
            .map(|(_, day)| day)
            .collect();
        let committed = if changed.is_empty() {
            Vec::new()
        } else {
            self.store.commit_days(changed)?
        };

        let mut events = vec![Event::SchedulePlanned {
            dates: committed.iter().map(|d| d.date).collect(),
            placed_units: result.work_units_placed(),
            unscheduled_tasks: result.unscheduled.len(),
            at: now,
        }];
        events.extend(result.urgent_unscheduled().map(|u| Event::UrgentUnscheduled {
            task_id: u.task_id.clone(),
            remaining_units: u.remaining_units,
            reason: u.reason,
            at: now,
        }));

        info!(
            committed = committed.len(),
            placed = result.work_units_placed(),
            trimmed,
            "plan committed"
        );
        Ok(PlanOutcome {
            result,
            committed,
            events,
        })
    }

    /// Drop scheduled work units `task` no longer needs, latest first.
    ///
    /// Call after lowering a task's total. Returns how many work units went.
    pub fn reconcile_task(&self, task: &Task) -> Result<usize> {
        let mut days = BTreeMap::new();
        for date in self.store.dates_with_task(&task.id)? {
            days.insert(date, self.store.get_day(date)?);
        }
        let before = days.clone();
        let trimmed = trim_surplus(&mut days, task);
        if trimmed > 0 {
            let changed: Vec<DaySchedule> = days
                .into_iter()
                .filter(|(date, day)| before.get(date) != Some(day))
                .map(|(_, day)| day)
                .collect();
            self.store.commit_days(changed)?;
            info!(task_id = %task.id, trimmed, "dropped surplus work units");
        }
        Ok(trimmed)
    }

    /// Move a slot, displacing whatever it lands on.
    pub fn move_slot(&self, mv: &SlotMove, now: NaiveDateTime) -> Result<MoveOutcome> {
        let source_date = self
            .store
            .find_slot_date(&mv.slot_id)?
            .ok_or_else(|| ConflictError::SlotNotFound(mv.slot_id.clone()))?;
        let source = self.store.get_day(source_date)?;
        let from_start = source
            .get(&mv.slot_id)
            .map(|s| s.start_minute)
            .ok_or_else(|| ConflictError::SlotNotFound(mv.slot_id.clone()))?;

        let (replacements, target_before) = if source_date == mv.new_date {
            let day = self.resolver.resolve(&source, mv)?;
            (vec![day], source)
        } else {
            let target = self.store.get_day(mv.new_date)?;
            let (src, dst) = self.resolver.resolve_between(&source, &target, mv)?;
            (vec![src, dst], target)
        };

        let displaced = replacements
            .last()
            .map(|after| count_displaced(&target_before, after, &mv.slot_id))
            .unwrap_or(0);
        let committed = self.store.commit_days(replacements)?;

        let event = Event::SlotMoved {
            slot_id: mv.slot_id.clone(),
            from_date: source_date,
            from_start,
            to_date: mv.new_date,
            to_start: mv.new_start,
            displaced,
            at: now,
        };
        Ok(MoveOutcome { committed, event })
    }

    /// Start, complete or skip a slot.
    ///
    /// The slot change is committed before the task's completed count is
    /// bumped, so a failed commit never credits a unit.
    pub fn apply_action(
        &self,
        slot_id: &str,
        action: LifecycleAction,
        now: NaiveDateTime,
        tasks: &dyn TaskStore,
    ) -> Result<ActionOutcome> {
        let date = self
            .store
            .find_slot_date(slot_id)?
            .ok_or_else(|| LifecycleError::SlotNotFound(slot_id.to_string()))?;
        let day = self.store.get_day(date)?;

        // Nothing expires on its own, so a unit left running days ago still counts.
        let owner = day
            .get(slot_id)
            .filter(|s| s.is_work())
            .and_then(|s| s.task_id.clone());
        let mut context = Vec::new();
        if let Some(task_id) = owner {
            for other in self.store.dates_with_task(&task_id)? {
                if other != date {
                    context.push(self.store.get_day(other)?);
                }
            }
        }

        let mut transition = lifecycle::apply(&day, slot_id, action, now, &context)?;
        transition.day = self.store.commit(transition.day)?;

        let task = match &transition.effect {
            TaskEffect::WorkUnitCompleted(task_id) => Some(tasks.record_completed_unit(task_id)?),
            TaskEffect::None => None,
        };
        Ok(ActionOutcome { transition, task })
    }

    /// Slots on `date` that ended while still scheduled or running.
    pub fn overdue(&self, date: NaiveDate, now: NaiveDateTime) -> Result<Vec<Slot>> {
        let day = self.store.get_day(date)?;
        Ok(lifecycle::overdue_slots(&day, now).into_iter().cloned().collect())
    }

    /// Delete a task together with all of its slots. Returns how many slots went.
    pub fn delete_task(&self, task_id: &str, tasks: &dyn TaskStore) -> Result<usize> {
        let removed = self.store.remove_task_slots(task_id)?;
        if !tasks.delete_task(task_id)? && removed == 0 {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(removed)
    }
}

/// Remove the latest `scheduled` work slots of `task` beyond its remaining units.
///
/// In-progress units are never touched. Returns how many work slots went.
fn trim_surplus(days: &mut BTreeMap<NaiveDate, DaySchedule>, task: &Task) -> usize {
    let pending: usize = days.values().map(|d| d.pending_work_for(&task.id)).sum();
    let surplus = pending.saturating_sub(task.remaining_units() as usize);
    if surplus == 0 {
        return 0;
    }

    let mut scheduled: Vec<(NaiveDate, u32, String)> = days
        .values()
        .flat_map(|d| d.iter())
        .filter(|s| s.belongs_to(&task.id) && s.is_work() && s.status == SlotStatus::Scheduled)
        .map(|s| (s.date, s.start_minute, s.id.clone()))
        .collect();
    scheduled.sort_unstable();

    let mut removed = 0;
    for (date, _, id) in scheduled.into_iter().rev().take(surplus) {
        if let Some(day) = days.get_mut(&date) {
            if day.remove_where(|s| s.id == id) > 0 {
                removed += 1;
            }
        }
    }
    debug!(task_id = %task.id, removed, "trimmed surplus units");
    removed
}

/// Slots other than `moved` whose start differs between the two versions of a day.
fn count_displaced(before: &DaySchedule, after: &DaySchedule, moved: &str) -> usize {
    after
        .iter()
        .filter(|s| s.id != moved)
        .filter(|s| {
            before
                .get(&s.id)
                .is_some_and(|old| old.start_minute != s.start_minute)
        })
        .count()
}

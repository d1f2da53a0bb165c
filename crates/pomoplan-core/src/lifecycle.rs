//! Slot status state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Scheduled -> InProgress -> Completed
//!     |            |
//!     +------------+-------> Missed
//! ```
//!
//! A scheduled slot whose start has passed may also be completed directly.
//! Completed and missed are terminal.
//!
//! Nothing here reads the clock. Callers pass `now`, and overdue slots are only
//! reported by [`overdue_slots`]; they are never marked missed automatically.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, ValidationError};
use crate::events::Event;
use crate::schedule::{DaySchedule, Slot, SlotStatus};

/// User action on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Start,
    Complete,
    Skip,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "complete" | "done" => Ok(Self::Complete),
            "skip" => Ok(Self::Skip),
            other => Err(ValidationError::InvalidValue {
                field: "action".into(),
                message: format!("unknown action '{other}'"),
            }),
        }
    }
}

/// What a transition means for the owning task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEffect {
    None,
    /// A work unit was finished; bump the task's completed count.
    WorkUnitCompleted(String),
}

/// Result of an accepted action.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Replacement schedule to commit
    pub day: DaySchedule,
    /// The slot after the change
    pub slot: Slot,
    pub event: Event,
    pub effect: TaskEffect,
}

/// Apply `action` to a slot in `day`.
///
/// `context` holds the other days the caller knows about; starting a work slot
/// is refused while another work slot of the same task is in progress on any
/// of them. It may include `day` itself.
///
/// # Errors
/// Returns [`LifecycleError::SlotNotFound`] if the slot is not in `day`, or
/// [`LifecycleError::InvalidTransition`] if the action is not allowed now.
pub fn apply(
    day: &DaySchedule,
    slot_id: &str,
    action: LifecycleAction,
    now: NaiveDateTime,
    context: &[DaySchedule],
) -> Result<Transition, LifecycleError> {
    let slot = day
        .get(slot_id)
        .ok_or_else(|| LifecycleError::SlotNotFound(slot_id.to_string()))?;

    let reject = |reason: String| LifecycleError::InvalidTransition {
        slot_id: slot.id.clone(),
        from: slot.status,
        action,
        reason,
    };

    if slot.status.is_terminal() {
        return Err(reject("slot is already final".into()));
    }

    let mut updated = slot.clone();
    let (event, effect) = match action {
        LifecycleAction::Start => {
            if slot.status != SlotStatus::Scheduled {
                return Err(reject("slot is already running".into()));
            }
            if slot.starts_at() > now {
                return Err(reject(format!("slot does not start until {}", slot.starts_at())));
            }
            if let Some(running) = running_work_for(slot, day, context) {
                return Err(reject(format!("slot {running} of the same task is in progress")));
            }
            updated.status = SlotStatus::InProgress;
            let event = Event::SlotStarted {
                slot_id: slot.id.clone(),
                task_id: slot.task_id.clone(),
                kind: slot.kind,
                at: now,
            };
            (event, TaskEffect::None)
        }
        LifecycleAction::Complete => {
            let implicit_start = slot.status == SlotStatus::Scheduled;
            if implicit_start {
                if slot.starts_at() > now {
                    return Err(reject(format!("slot does not start until {}", slot.starts_at())));
                }
                if let Some(running) = running_work_for(slot, day, context) {
                    return Err(reject(format!("slot {running} of the same task is in progress")));
                }
            }
            updated.status = SlotStatus::Completed;
            let effect = match (&slot.task_id, slot.is_work()) {
                (Some(task_id), true) => TaskEffect::WorkUnitCompleted(task_id.clone()),
                _ => TaskEffect::None,
            };
            let event = Event::SlotCompleted {
                slot_id: slot.id.clone(),
                task_id: slot.task_id.clone(),
                kind: slot.kind,
                implicit_start,
                at: now,
            };
            (event, effect)
        }
        LifecycleAction::Skip => {
            updated.status = SlotStatus::Missed;
            let event = Event::SlotMissed {
                slot_id: slot.id.clone(),
                task_id: slot.task_id.clone(),
                kind: slot.kind,
                at: now,
            };
            (event, TaskEffect::None)
        }
    };

    let mut next = day.clone();
    next.replace(updated.clone());
    Ok(Transition {
        day: next,
        slot: updated,
        event,
        effect,
    })
}

/// Id of another in-progress work slot of the same task, if any.
fn running_work_for<'a>(
    slot: &Slot,
    day: &'a DaySchedule,
    context: &'a [DaySchedule],
) -> Option<&'a str> {
    let task_id = slot.task_id.as_deref().filter(|_| slot.is_work())?;
    std::iter::once(day)
        .chain(context.iter())
        .flat_map(|d| d.iter())
        .find(|s| {
            s.id != slot.id
                && s.is_work()
                && s.status == SlotStatus::InProgress
                && s.belongs_to(task_id)
        })
        .map(|s| s.id.as_str())
}

/// Slots whose end has passed while still scheduled or running.
pub fn overdue_slots(day: &DaySchedule, now: NaiveDateTime) -> Vec<&Slot> {
    day.iter()
        .filter(|s| s.status.is_pending() && s.ends_at() <= now)
        .collect()
}

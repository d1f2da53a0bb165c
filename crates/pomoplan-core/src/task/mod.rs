//! Task type consumed by the allocator.
//!
//! Tasks are owned by the external task store. The scheduler only reads them,
//! except for `completed_work_units`, which the lifecycle manager bumps when a
//! work slot is completed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::priority::PriorityClass;

/// A unit of work measured in pomodoros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    pub title: String,
    pub priority: PriorityClass,
    /// Number of work blocks (pomodoros) the task needs in total
    pub total_work_units: u32,
    /// Number of work blocks already completed
    #[serde(default)]
    pub completed_work_units: u32,
    pub due_date: Option<NaiveDate>,
    /// Whether the allocator may place this task
    pub auto_schedule: bool,
    /// Opaque project key owned by the project store
    #[serde(default)]
    pub project_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with a fresh id and the priority's auto-schedule default.
    pub fn new(title: impl Into<String>, priority: PriorityClass, total_work_units: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            priority,
            total_work_units,
            completed_work_units: 0,
            due_date: None,
            auto_schedule: priority.auto_schedule_default(),
            project_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_auto_schedule(mut self, auto_schedule: bool) -> Self {
        self.auto_schedule = auto_schedule;
        self
    }

    pub fn with_project(mut self, project_ref: impl Into<String>) -> Self {
        self.project_ref = Some(project_ref.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Units not yet completed (ignores units that are merely scheduled).
    pub fn remaining_units(&self) -> u32 {
        self.total_work_units.saturating_sub(self.completed_work_units)
    }

    pub fn is_done(&self) -> bool {
        self.completed_work_units >= self.total_work_units
    }

    /// Eligible for the allocator: opted in and not finished.
    pub fn is_schedulable(&self) -> bool {
        self.auto_schedule && !self.is_done()
    }

    /// Count one more completed unit, capped at the total.
    ///
    /// Returns `false` when the task was already complete.
    pub fn record_completed_unit(&mut self) -> bool {
        if self.is_done() {
            return false;
        }
        self.completed_work_units += 1;
        true
    }

    /// Check the task's own invariants.
    ///
    /// # Errors
    /// Returns an error for an empty title, a zero unit count, or more
    /// completed units than the total.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            });
        }
        if self.total_work_units == 0 {
            return Err(ValidationError::InvalidValue {
                field: "total_work_units".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.completed_work_units > self.total_work_units {
            return Err(ValidationError::InvalidValue {
                field: "completed_work_units".into(),
                message: format!(
                    "{} exceeds total of {}",
                    self.completed_work_units, self.total_work_units
                ),
            });
        }
        Ok(())
    }
}

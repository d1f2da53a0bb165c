//! Seams to the outside world: where tasks live and where days are persisted.

use chrono::NaiveDate;

use crate::error::{DatabaseError, Result};
use crate::schedule::DaySchedule;
use crate::task::Task;

/// Owner of task records.
///
/// The scheduler only reads tasks; the one write it needs is
/// [`record_completed_unit`](TaskStore::record_completed_unit).
pub trait TaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>>;

    fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Insert or replace.
    fn save_task(&self, task: &Task) -> Result<()>;

    /// Returns `false` if no such task existed.
    fn delete_task(&self, id: &str) -> Result<bool>;

    /// Bump `completed_work_units` by one, capped at the total.
    ///
    /// # Errors
    /// Returns [`CoreError::TaskNotFound`](crate::CoreError::TaskNotFound) for an unknown id.
    fn record_completed_unit(&self, task_id: &str) -> Result<Task> {
        let mut task = self
            .get_task(task_id)?
            .ok_or_else(|| crate::CoreError::TaskNotFound(task_id.to_string()))?;
        task.record_completed_unit();
        self.save_task(&task)?;
        Ok(task)
    }
}

/// Durable storage behind the schedule store.
pub trait DayPersistence {
    fn load_day(&self, date: NaiveDate) -> Result<Option<DaySchedule>, DatabaseError>;

    /// Replace all given days in one transaction.
    fn save_days(&self, days: &[DaySchedule]) -> Result<(), DatabaseError>;

    /// Date of the day holding `slot_id`, if persisted.
    fn find_slot_date(&self, slot_id: &str) -> Result<Option<NaiveDate>, DatabaseError>;

    /// Dates holding at least one slot owned by `task_id`.
    fn dates_with_task(&self, task_id: &str) -> Result<Vec<NaiveDate>, DatabaseError>;
}

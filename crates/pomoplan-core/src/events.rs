use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schedule::SlotKind;
use crate::scheduler::UnscheduledReason;

/// Every accepted schedule change produces an Event.
/// The core never notifies anyone itself; front-ends drain these and decide
/// what to announce. Timestamps are local wall-clock time, like slot times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SlotStarted {
        slot_id: String,
        task_id: Option<String>,
        kind: SlotKind,
        at: NaiveDateTime,
    },
    SlotCompleted {
        slot_id: String,
        task_id: Option<String>,
        kind: SlotKind,
        /// Completed straight from `scheduled` without a start
        implicit_start: bool,
        at: NaiveDateTime,
    },
    /// Skipped by the user; kept for statistics.
    SlotMissed {
        slot_id: String,
        task_id: Option<String>,
        kind: SlotKind,
        at: NaiveDateTime,
    },
    SlotMoved {
        slot_id: String,
        from_date: NaiveDate,
        from_start: u32,
        to_date: NaiveDate,
        to_start: u32,
        /// Other slots pushed later to make room
        displaced: usize,
        at: NaiveDateTime,
    },
    /// An allocator run was committed to the store.
    SchedulePlanned {
        dates: Vec<NaiveDate>,
        placed_units: usize,
        unscheduled_tasks: usize,
        at: NaiveDateTime,
    },
    /// A task had to land today and did not fit.
    UrgentUnscheduled {
        task_id: String,
        remaining_units: u32,
        reason: UnscheduledReason,
        at: NaiveDateTime,
    },
}

impl Event {
    pub fn at(&self) -> NaiveDateTime {
        match self {
            Self::SlotStarted { at, .. }
            | Self::SlotCompleted { at, .. }
            | Self::SlotMissed { at, .. }
            | Self::SlotMoved { at, .. }
            | Self::SchedulePlanned { at, .. }
            | Self::UrgentUnscheduled { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let event = Event::SlotMissed {
            slot_id: "s1".into(),
            task_id: Some("t1".into()),
            kind: SlotKind::Work,
            at,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SlotMissed");
        assert_eq!(json["kind"], "work");
        assert_eq!(event.at(), at);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

//! A single interval on the timeline.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for name-based slot ids, so an allocator run is reproducible.
const SLOT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2c0e_8b7a_4e55_9a3c_51d2_7e0b_c4a1);

/// Kind of time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// One pomodoro of focused work
    Work,
    ShortBreak,
    LongBreak,
    /// Transition time after a task's run of work units
    Buffer,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
            Self::Buffer => "buffer",
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "work" => Some(Self::Work),
            "short_break" => Some(Self::ShortBreak),
            "long_break" => Some(Self::LongBreak),
            "buffer" => Some(Self::Buffer),
            _ => None,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "missed" => Some(Self::Missed),
            _ => None,
        }
    }

    /// Completed and missed slots never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Missed)
    }

    /// Still counts against a task's remaining units.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled interval on a specific date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    /// Owning task; `None` only for breaks.
    pub task_id: Option<String>,
    pub date: NaiveDate,
    /// Minute of day the slot starts at
    pub start_minute: u32,
    pub kind: SlotKind,
    pub duration_minutes: u32,
    pub status: SlotStatus,
}

impl Slot {
    /// Create a `scheduled` slot with an id derived from its position.
    pub fn planned(
        date: NaiveDate,
        start_minute: u32,
        kind: SlotKind,
        duration_minutes: u32,
        task_id: Option<&str>,
    ) -> Self {
        Self::planned_at_revision(0, date, start_minute, kind, duration_minutes, task_id)
    }

    /// Like [`planned`](Self::planned), salting the id with the day revision it is planned against.
    ///
    /// Two slots on one date never share a start minute, and every commit bumps
    /// the revision, so a slot moved away from a position cannot collide with a
    /// later slot planned there. Identical runs still produce identical ids.
    pub fn planned_at_revision(
        revision: u64,
        date: NaiveDate,
        start_minute: u32,
        kind: SlotKind,
        duration_minutes: u32,
        task_id: Option<&str>,
    ) -> Self {
        let name = format!(
            "{date}|{start_minute}|{}|{}|{revision}",
            kind.as_str(),
            task_id.unwrap_or("-")
        );
        Self {
            id: Uuid::new_v5(&SLOT_NAMESPACE, name.as_bytes()).to_string(),
            task_id: task_id.map(str::to_string),
            date,
            start_minute,
            kind,
            duration_minutes,
            status: SlotStatus::Scheduled,
        }
    }

    /// Saturates instead of wrapping, so a bogus start still reads as out of range.
    pub fn end_minute(&self) -> u32 {
        self.start_minute.saturating_add(self.duration_minutes)
    }

    /// Whether `[start, end)` intersects this slot.
    pub fn overlaps_range(&self, start: u32, end: u32) -> bool {
        self.start_minute < end && self.end_minute() > start
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.date == other.date && self.overlaps_range(other.start_minute, other.end_minute())
    }

    pub fn is_work(&self) -> bool {
        self.kind == SlotKind::Work
    }

    /// A work slot that still counts toward its task's remaining units.
    pub fn is_pending_work(&self) -> bool {
        self.is_work() && self.status.is_pending()
    }

    pub fn belongs_to(&self, task_id: &str) -> bool {
        self.task_id.as_deref() == Some(task_id)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(self.start_minute))
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(self.end_minute()))
    }
}

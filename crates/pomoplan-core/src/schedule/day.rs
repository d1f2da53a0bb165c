//! Ordered, non-overlapping slots for one calendar date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::slot::{Slot, SlotKind, SlotStatus};
use super::window::MINUTES_PER_DAY;
use crate::error::ValidationError;

/// The slots of one date, sorted by start minute.
///
/// `version` is the store revision this copy was read at. The store compares it
/// on commit and refuses replacements built from an outdated read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    #[serde(default)]
    pub version: u64,
    slots: Vec<Slot>,
}

impl DaySchedule {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            version: 0,
            slots: Vec::new(),
        }
    }

    /// Build from arbitrary slots, sorting them. Call [`validate`](Self::validate) before trusting it.
    pub fn from_slots(date: NaiveDate, version: u64, mut slots: Vec<Slot>) -> Self {
        slots.sort_by_key(|s| s.start_minute);
        Self {
            date,
            version,
            slots,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    pub fn position(&self, slot_id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id == slot_id)
    }

    /// Insert keeping start order. Does not check for overlap.
    pub fn insert(&mut self, slot: Slot) {
        let at = self
            .slots
            .partition_point(|s| s.start_minute <= slot.start_minute);
        self.slots.insert(at, slot);
    }

    pub fn remove(&mut self, slot_id: &str) -> Option<Slot> {
        let idx = self.position(slot_id)?;
        Some(self.slots.remove(idx))
    }

    /// Replace the slot with the same id, re-sorting if its start moved.
    pub fn replace(&mut self, slot: Slot) -> bool {
        match self.remove(&slot.id) {
            Some(_) => {
                self.insert(slot);
                true
            }
            None => false,
        }
    }

    /// Remove every slot owned by `task_id`, with the breaks that only
    /// existed to separate its units. Returns how many slots were dropped.
    pub fn remove_task(&mut self, task_id: &str) -> usize {
        self.remove_where(|s| s.belongs_to(task_id))
    }

    /// Remove the slots matching `doomed`.
    ///
    /// A scheduled break that touches a removed work slot goes with it, as
    /// does a scheduled buffer that started where removed work ended.
    pub(crate) fn remove_where(&mut self, doomed: impl Fn(&Slot) -> bool) -> usize {
        let gone: Vec<(u32, u32)> = self
            .slots
            .iter()
            .filter(|s| s.is_work() && doomed(s))
            .map(|s| (s.start_minute, s.end_minute()))
            .collect();
        let orphaned = |s: &Slot| {
            if s.status != SlotStatus::Scheduled {
                return false;
            }
            if s.kind.is_break() {
                gone.iter()
                    .any(|(start, end)| s.end_minute() == *start || s.start_minute == *end)
            } else {
                s.kind == SlotKind::Buffer && gone.iter().any(|(_, end)| s.start_minute == *end)
            }
        };

        let before = self.slots.len();
        self.slots.retain(|s| !doomed(s) && !orphaned(s));
        before - self.slots.len()
    }

    /// Copy without the slots still `scheduled`, for a fresh allocator pass.
    ///
    /// In-progress and terminal slots are history and stay put.
    pub fn without_pending(&self) -> Self {
        Self {
            date: self.date,
            version: self.version,
            slots: self
                .slots
                .iter()
                .filter(|s| s.status != SlotStatus::Scheduled)
                .cloned()
                .collect(),
        }
    }

    /// Pending work slots (scheduled or in progress) for `task_id`.
    pub fn pending_work_for(&self, task_id: &str) -> usize {
        self.slots
            .iter()
            .filter(|s| s.belongs_to(task_id) && s.is_pending_work())
            .count()
    }

    /// Whether `[start, end)` is free, optionally ignoring one slot.
    pub fn is_free(&self, start: u32, end: u32, ignore: Option<&str>) -> bool {
        !self
            .slots
            .iter()
            .filter(|s| Some(s.id.as_str()) != ignore)
            .any(|s| s.overlaps_range(start, end))
    }

    /// Minutes covered by work slots.
    pub fn focus_minutes(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.kind == SlotKind::Work)
            .map(|s| s.duration_minutes)
            .sum()
    }

    /// First pair of overlapping slots, if any. Assumes sorted order.
    pub fn first_overlap(&self) -> Option<(&Slot, &Slot)> {
        let mut latest: Option<&Slot> = None;
        for slot in &self.slots {
            if let Some(prev) = latest {
                if prev.end_minute() > slot.start_minute {
                    return Some((prev, slot));
                }
                if slot.end_minute() > prev.end_minute() {
                    latest = Some(slot);
                }
            } else {
                latest = Some(slot);
            }
        }
        None
    }

    /// Check the day invariants: matching dates, sorted, no overlap, within the day.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::InvalidValue {
            field: format!("day {}", self.date),
            message,
        };
        for slot in &self.slots {
            if slot.date != self.date {
                return Err(invalid(format!("slot {} is dated {}", slot.id, slot.date)));
            }
            if slot.duration_minutes == 0 {
                return Err(invalid(format!("slot {} has zero duration", slot.id)));
            }
            if slot.end_minute() > MINUTES_PER_DAY {
                return Err(invalid(format!("slot {} runs past midnight", slot.id)));
            }
        }
        if self
            .slots
            .windows(2)
            .any(|w| w[0].start_minute > w[1].start_minute)
        {
            return Err(invalid("slots are not sorted by start".into()));
        }
        if let Some((a, b)) = self.first_overlap() {
            return Err(invalid(format!("slot {} overlaps slot {}", a.id, b.id)));
        }
        let mut ids: Vec<&str> = self.slots.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("duplicate slot id".into()));
        }
        Ok(())
    }
}

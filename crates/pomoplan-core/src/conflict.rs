//! Manual rescheduling with forward displacement.
//!
//! A [`SlotMove`] puts one slot at a requested date and start. Any scheduled
//! slot it lands on is pushed later by exactly the overlap, cascading through
//! the rest of the day in start order. Slots that are running or finished are
//! pinned and never move.
//!
//! The resolver works on copies. On any error the caller's schedule is exactly
//! what it was before the call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConflictError;
use crate::schedule::{DaySchedule, Slot, SlotStatus, TimeWindow, WorkingHours};

/// Request to move a slot, typically from a drag on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMove {
    pub slot_id: String,
    pub new_date: NaiveDate,
    /// Requested start, minute of day
    pub new_start: u32,
}

impl SlotMove {
    pub fn new(slot_id: impl Into<String>, new_date: NaiveDate, new_start: u32) -> Self {
        Self {
            slot_id: slot_id.into(),
            new_date,
            new_start,
        }
    }
}

/// Applies manual moves while keeping every day free of overlaps.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    working_hours: WorkingHours,
}

impl ConflictResolver {
    pub fn new(working_hours: WorkingHours) -> Self {
        Self { working_hours }
    }

    pub fn working_hours(&self) -> &WorkingHours {
        &self.working_hours
    }

    /// Move a slot within `day`.
    ///
    /// # Errors
    /// Returns an error when the slot is missing or not `scheduled`, the
    /// target is outside working hours, or displacement cannot stay inside them.
    pub fn resolve(&self, day: &DaySchedule, mv: &SlotMove) -> Result<DaySchedule, ConflictError> {
        if mv.new_date != day.date {
            return Err(ConflictError::DateMismatch {
                requested: mv.new_date,
                schedule: day.date,
            });
        }
        let moved = movable_slot(day, &mv.slot_id)?;

        let mut rest = day.clone();
        rest.remove(&mv.slot_id);

        let mut slot = moved.clone();
        slot.start_minute = mv.new_start;
        self.place(&rest, slot)
    }

    /// Move a slot from `source` onto another date.
    ///
    /// Returns the replacement `(source, target)` pair; both must be committed together.
    pub fn resolve_between(
        &self,
        source: &DaySchedule,
        target: &DaySchedule,
        mv: &SlotMove,
    ) -> Result<(DaySchedule, DaySchedule), ConflictError> {
        if mv.new_date != target.date {
            return Err(ConflictError::DateMismatch {
                requested: mv.new_date,
                schedule: target.date,
            });
        }
        if source.date == target.date {
            let day = self.resolve(target, mv)?;
            return Ok((day.clone(), day));
        }
        let moved = movable_slot(source, &mv.slot_id)?;

        let mut slot = moved.clone();
        slot.date = target.date;
        slot.start_minute = mv.new_start;
        let placed = self.place(target, slot)?;

        let mut remaining = source.clone();
        remaining.remove(&mv.slot_id);
        Ok((remaining, placed))
    }

    /// Put `moved` into `target` (which must not contain it) and displace the rest.
    fn place(&self, target: &DaySchedule, moved: Slot) -> Result<DaySchedule, ConflictError> {
        let window = self
            .working_hours
            .window_for(target.date)
            .ok_or(ConflictError::NonWorkingDay(target.date))?;
        check_inside(&moved, window)?;

        let (pinned, mut movable): (Vec<Slot>, Vec<Slot>) = target
            .iter()
            .cloned()
            .partition(|s| s.status != SlotStatus::Scheduled);

        if let Some(blocker) = pinned.iter().find(|p| p.overlaps(&moved)) {
            warn!(slot_id = %moved.id, blocker = %blocker.id, "move lands on a pinned slot");
            return Err(ConflictError::Unresolvable {
                slot_id: blocker.id.clone(),
            });
        }

        let mut occupied: Vec<(u32, u32)> = pinned
            .iter()
            .chain(std::iter::once(&moved))
            .map(|s| (s.start_minute, s.end_minute()))
            .collect();
        let mut result = pinned;
        result.push(moved);

        movable.sort_by_key(|s| s.start_minute);
        for mut slot in movable {
            let original = slot.start_minute;
            slot.start_minute = first_clear_start(&occupied, original, slot.duration_minutes);
            if slot.start_minute != original {
                if slot.end_minute() > window.end {
                    warn!(slot_id = %slot.id, "displacement runs past working hours");
                    return Err(ConflictError::Unresolvable { slot_id: slot.id });
                }
                debug!(
                    slot_id = %slot.id,
                    from = original,
                    to = slot.start_minute,
                    "displaced slot"
                );
            }
            occupied.push((slot.start_minute, slot.end_minute()));
            result.push(slot);
        }

        Ok(DaySchedule::from_slots(target.date, target.version, result))
    }
}

/// Every pair of overlapping slots in `day`, in start order.
pub fn find_overlaps(day: &DaySchedule) -> Vec<(String, String)> {
    let slots = day.slots();
    let mut pairs = Vec::new();
    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if b.start_minute >= a.end_minute() {
                break;
            }
            pairs.push((a.id.clone(), b.id.clone()));
        }
    }
    pairs
}

fn movable_slot<'d>(day: &'d DaySchedule, slot_id: &str) -> Result<&'d Slot, ConflictError> {
    let slot = day
        .get(slot_id)
        .ok_or_else(|| ConflictError::SlotNotFound(slot_id.to_string()))?;
    if slot.status != SlotStatus::Scheduled {
        return Err(ConflictError::SlotLocked {
            slot_id: slot.id.clone(),
            status: slot.status,
        });
    }
    Ok(slot)
}

fn check_inside(slot: &Slot, window: TimeWindow) -> Result<(), ConflictError> {
    if window.contains(slot.start_minute, slot.end_minute()) {
        return Ok(());
    }
    Err(ConflictError::OutsideWorkingHours {
        slot_id: slot.id.clone(),
        start: slot.start_minute,
        end: slot.end_minute(),
        window_start: window.start,
        window_end: window.end,
    })
}

/// Earliest start at or after `start` that overlaps nothing in `occupied`.
fn first_clear_start(occupied: &[(u32, u32)], mut start: u32, duration: u32) -> u32 {
    while let Some(end) = occupied
        .iter()
        .filter(|(s, e)| *s < start.saturating_add(duration) && *e > start)
        .map(|(_, e)| *e)
        .max()
    {
        start = end;
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::SlotKind;
    use chrono::Weekday;

    // Monday
    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn hours() -> WorkingHours {
        WorkingHours::parse("09:00", "12:00", vec![Weekday::Mon, Weekday::Tue]).unwrap()
    }

    fn work(start: u32, task: &str) -> Slot {
        Slot::planned(date(), start, SlotKind::Work, 25, Some(task))
    }

    #[test]
    fn displaces_occupant_by_exactly_the_overlap() {
        let m = work(540, "m");
        let o = work(600, "o");
        let day = DaySchedule::from_slots(date(), 2, vec![m.clone(), o.clone()]);
        let resolver = ConflictResolver::new(hours());

        // m to 09:50, overlapping o at 10:00 by 15 minutes.
        let out = resolver.resolve(&day, &SlotMove::new(&m.id, date(), 590)).unwrap();
        assert_eq!(out.get(&m.id).unwrap().start_minute, 590);
        assert_eq!(out.get(&o.id).unwrap().start_minute, 615);
        assert_eq!(out.version, 2);
        assert!(out.validate().is_ok());
    }

    #[test]
    fn displacement_cascades_through_later_slots() {
        let a = work(540, "a");
        let b = work(600, "b");
        let c = work(625, "c");
        let day = DaySchedule::from_slots(date(), 0, vec![a.clone(), b.clone(), c.clone()]);
        let out = ConflictResolver::new(hours())
            .resolve(&day, &SlotMove::new(&a.id, date(), 590))
            .unwrap();
        assert_eq!(out.get(&b.id).unwrap().start_minute, 615);
        assert_eq!(out.get(&c.id).unwrap().start_minute, 640);
        assert!(find_overlaps(&out).is_empty());
    }

    #[test]
    fn untouched_slots_keep_their_place() {
        let a = work(540, "a");
        let b = work(660, "b");
        let day = DaySchedule::from_slots(date(), 0, vec![a.clone(), b.clone()]);
        let out = ConflictResolver::new(hours())
            .resolve(&day, &SlotMove::new(&a.id, date(), 600))
            .unwrap();
        assert_eq!(out.get(&b.id).unwrap().start_minute, 660);
    }

    #[test]
    fn rejects_target_outside_working_hours() {
        let a = work(540, "a");
        let day = DaySchedule::from_slots(date(), 0, vec![a.clone()]);
        let err = ConflictResolver::new(hours())
            .resolve(&day, &SlotMove::new(&a.id, date(), 710))
            .unwrap_err();
        assert!(matches!(err, ConflictError::OutsideWorkingHours { end: 735, .. }));
    }

    #[test]
    fn fails_atomically_when_displacement_leaves_the_window() {
        let a = work(540, "a");
        let b = work(690, "b");
        let day = DaySchedule::from_slots(date(), 4, vec![a.clone(), b.clone()]);
        let before = day.clone();
        let err = ConflictResolver::new(hours())
            .resolve(&day, &SlotMove::new(&a.id, date(), 680))
            .unwrap_err();
        assert_eq!(err, ConflictError::Unresolvable { slot_id: b.id.clone() });
        assert_eq!(day, before);
    }

    #[test]
    fn pinned_slots_block_and_cannot_move() {
        let a = work(540, "a");
        let mut running = work(600, "r");
        running.status = SlotStatus::InProgress;
        let day = DaySchedule::from_slots(date(), 0, vec![a.clone(), running.clone()]);
        let resolver = ConflictResolver::new(hours());

        let err = resolver
            .resolve(&day, &SlotMove::new(&a.id, date(), 610))
            .unwrap_err();
        assert!(matches!(err, ConflictError::Unresolvable { .. }));

        let err = resolver
            .resolve(&day, &SlotMove::new(&running.id, date(), 660))
            .unwrap_err();
        assert!(matches!(err, ConflictError::SlotLocked { status: SlotStatus::InProgress, .. }));
    }

    #[test]
    fn displaced_slot_jumps_over_pinned_slot() {
        let a = work(540, "a");
        let b = work(600, "b");
        let mut done = work(625, "d");
        done.status = SlotStatus::Completed;
        let day = DaySchedule::from_slots(date(), 0, vec![a.clone(), b.clone(), done]);
        let out = ConflictResolver::new(hours())
            .resolve(&day, &SlotMove::new(&a.id, date(), 590))
            .unwrap();
        // b pushed to 10:15 would hit the completed slot at 10:25, so it lands at 10:50.
        assert_eq!(out.get(&b.id).unwrap().start_minute, 650);
    }

    #[test]
    fn moves_across_dates() {
        let a = work(540, "a");
        let tuesday = date().succ_opt().unwrap();
        let occupant = Slot::planned(tuesday, 540, SlotKind::Work, 25, Some("o"));
        let source = DaySchedule::from_slots(date(), 1, vec![a.clone()]);
        let target = DaySchedule::from_slots(tuesday, 5, vec![occupant.clone()]);

        let (src, dst) = ConflictResolver::new(hours())
            .resolve_between(&source, &target, &SlotMove::new(&a.id, tuesday, 540))
            .unwrap();
        assert!(src.is_empty());
        assert_eq!(src.version, 1);
        assert_eq!(dst.version, 5);
        let moved = dst.get(&a.id).unwrap();
        assert_eq!(moved.date, tuesday);
        assert_eq!(moved.task_id.as_deref(), Some("a"));
        assert_eq!(dst.get(&occupant.id).unwrap().start_minute, 565);
    }

    #[test]
    fn absurd_start_is_outside_working_hours() {
        let m = work(540, "m");
        let day = DaySchedule::from_slots(date(), 0, vec![m.clone()]);
        let resolver = ConflictResolver::new(hours());
        let err = resolver
            .resolve(&day, &SlotMove::new(&m.id, date(), u32::MAX - 5))
            .unwrap_err();
        assert!(matches!(err, ConflictError::OutsideWorkingHours { end: u32::MAX, .. }));
    }

    #[test]
    fn rejects_non_working_day() {
        let a = work(540, "a");
        let wednesday = date() + chrono::Duration::days(2);
        let source = DaySchedule::from_slots(date(), 0, vec![a.clone()]);
        let target = DaySchedule::new(wednesday);
        let err = ConflictResolver::new(hours())
            .resolve_between(&source, &target, &SlotMove::new(&a.id, wednesday, 540))
            .unwrap_err();
        assert_eq!(err, ConflictError::NonWorkingDay(wednesday));
    }

    #[test]
    fn find_overlaps_reports_every_pair() {
        let long = Slot::planned(date(), 540, SlotKind::Buffer, 60, Some("x"));
        let a = work(550, "a");
        let b = work(570, "b");
        let day = DaySchedule::from_slots(date(), 0, vec![long.clone(), a.clone(), b.clone()]);
        let pairs = find_overlaps(&day);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.contains(&(a.id.clone(), b.id.clone())));
    }
}

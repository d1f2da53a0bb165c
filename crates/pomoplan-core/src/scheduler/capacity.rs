//! Per-day free-capacity tracking for the allocator.
//!
//! A [`DayPlanner`] holds every slot occupying one date (committed slots plus
//! those placed earlier in the same run) and finds the earliest position for
//! the next work unit, inserting the break the pomodoro cadence calls for.

use chrono::NaiveDate;

use super::SchedulerConfig;
use crate::schedule::{DaySchedule, Slot, SlotKind, TimeWindow};

pub(crate) struct DayPlanner<'a> {
    date: NaiveDate,
    revision: u64,
    window: TimeWindow,
    config: &'a SchedulerConfig,
    occupied: Vec<Slot>,
}

impl<'a> DayPlanner<'a> {
    pub fn new(
        date: NaiveDate,
        window: TimeWindow,
        existing: Option<&DaySchedule>,
        config: &'a SchedulerConfig,
    ) -> Self {
        let occupied = existing
            .map(|day| day.slots().to_vec())
            .unwrap_or_default();
        Self {
            date,
            revision: existing.map_or(0, |day| day.version),
            window,
            config,
            occupied,
        }
    }

    /// Free intervals inside the working window, in start order.
    fn free_gaps(&self) -> Vec<TimeWindow> {
        let mut gaps = Vec::new();
        let mut last_end = self.window.start;

        for slot in &self.occupied {
            if slot.end_minute() <= last_end {
                continue;
            }
            if slot.start_minute >= self.window.end {
                break;
            }
            if slot.start_minute > last_end {
                gaps.push(TimeWindow {
                    start: last_end,
                    end: slot.start_minute.min(self.window.end),
                });
            }
            last_end = slot.end_minute().min(self.window.end);
        }

        if last_end < self.window.end {
            gaps.push(TimeWindow {
                start: last_end,
                end: self.window.end,
            });
        }
        gaps
    }

    fn free_minutes(&self) -> u32 {
        self.free_gaps().iter().map(TimeWindow::duration_minutes).sum()
    }

    /// Place one work unit for `task_id` at the earliest feasible start.
    ///
    /// Returns the placed slots (a break, when the unit directly follows other
    /// work, then the work slot), or `None` when the day has no room left.
    pub fn place_unit(&mut self, task_id: &str) -> Option<Vec<Slot>> {
        let session = self.config.session_duration_minutes;
        if self.free_minutes() < session {
            return None;
        }

        for start in self.candidate_starts() {
            let break_kind = self
                .work_ends_at(start)
                .then(|| self.break_kind_after(start));
            let break_len = break_kind.map_or(0, |k| self.config.break_minutes(k));
            let work_start = start + break_len;
            let work_end = work_start + session;

            if work_end > self.window.end || !self.is_free(start, work_end) {
                continue;
            }
            // No break would separate this unit from the work right after it.
            if self.work_starts_at(work_end) {
                continue;
            }

            let mut placed = Vec::with_capacity(2);
            if let Some(kind) = break_kind {
                placed.push(self.slot(start, kind, break_len, None));
            }
            placed.push(self.slot(
                work_start,
                SlotKind::Work,
                session,
                Some(task_id),
            ));
            for slot in &placed {
                self.occupy(slot.clone());
            }
            return Some(placed);
        }
        None
    }

    /// Append a buffer right after `after`, if buffers are enabled and it fits.
    pub fn place_buffer(&mut self, after: &Slot, task_id: &str) -> Option<Slot> {
        let minutes = self.config.buffer_minutes;
        if minutes == 0 {
            return None;
        }
        let start = after.end_minute();
        let end = start + minutes;
        if end > self.window.end || !self.is_free(start, end) {
            return None;
        }
        let slot = self.slot(start, SlotKind::Buffer, minutes, Some(task_id));
        self.occupy(slot.clone());
        Some(slot)
    }

    /// Window start plus every slot end inside the window, ascending.
    ///
    /// Each free gap begins at one of these points, so scanning them in order
    /// yields the earliest feasible placement.
    fn candidate_starts(&self) -> Vec<u32> {
        let mut starts: Vec<u32> = std::iter::once(self.window.start)
            .chain(
                self.occupied
                    .iter()
                    .map(Slot::end_minute)
                    .filter(|end| *end > self.window.start && *end < self.window.end),
            )
            .filter(|start| self.is_free(*start, start + 1))
            .collect();
        starts.sort_unstable();
        starts.dedup();
        starts
    }

    fn slot(&self, start: u32, kind: SlotKind, minutes: u32, task_id: Option<&str>) -> Slot {
        Slot::planned_at_revision(self.revision, self.date, start, kind, minutes, task_id)
    }

    fn is_free(&self, start: u32, end: u32) -> bool {
        !self.occupied.iter().any(|s| s.overlaps_range(start, end))
    }

    fn occupy(&mut self, slot: Slot) {
        let at = self
            .occupied
            .partition_point(|s| s.start_minute <= slot.start_minute);
        self.occupied.insert(at, slot);
    }

    fn slot_ending_at(&self, minute: u32) -> Option<&Slot> {
        self.occupied.iter().find(|s| s.end_minute() == minute)
    }

    fn work_ends_at(&self, minute: u32) -> bool {
        self.slot_ending_at(minute).is_some_and(Slot::is_work)
    }

    fn work_starts_at(&self, minute: u32) -> bool {
        self.occupied
            .iter()
            .any(|s| s.is_work() && s.start_minute == minute)
    }

    /// Work units in the contiguous run ending at `minute`.
    ///
    /// Short breaks continue the run; a long break, buffer or gap ends it.
    fn work_streak_ending_at(&self, minute: u32) -> u32 {
        let mut cursor = minute;
        let mut streak = 0;
        while let Some(slot) = self.slot_ending_at(cursor) {
            match slot.kind {
                SlotKind::Work => streak += 1,
                SlotKind::ShortBreak => {}
                SlotKind::LongBreak | SlotKind::Buffer => break,
            }
            cursor = slot.start_minute;
        }
        streak
    }

    fn break_kind_after(&self, minute: u32) -> SlotKind {
        let cadence = self.config.sessions_until_long_break.max(1);
        if self.work_streak_ending_at(minute) % cadence == 0 {
            SlotKind::LongBreak
        } else {
            SlotKind::ShortBreak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DaySchedule;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(540, 720).unwrap()
    }

    #[test]
    fn first_unit_starts_at_window_open_without_break() {
        let config = SchedulerConfig::default();
        let mut planner = DayPlanner::new(date(), window(), None, &config);
        let placed = planner.place_unit("t").unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].start_minute, 540);
        assert_eq!(placed[0].kind, SlotKind::Work);
    }

    #[test]
    fn fourth_consecutive_unit_is_followed_by_long_break() {
        let config = SchedulerConfig::default();
        let mut planner = DayPlanner::new(date(), TimeWindow::new(540, 900).unwrap(), None, &config);
        for _ in 0..4 {
            planner.place_unit("t").unwrap();
        }
        let fifth = planner.place_unit("t").unwrap();
        assert_eq!(fifth[0].kind, SlotKind::LongBreak);
        assert_eq!(fifth[0].duration_minutes, 15);
        // 4 units + 3 short breaks end at 10:55.
        assert_eq!(fifth[0].start_minute, 655);
        let sixth = planner.place_unit("t").unwrap();
        assert_eq!(sixth[0].kind, SlotKind::ShortBreak);
    }

    #[test]
    fn units_skip_over_existing_commitments() {
        let config = SchedulerConfig::default();
        let meeting = Slot::planned(date(), 560, SlotKind::Buffer, 60, Some("meeting"));
        let existing = DaySchedule::from_slots(date(), 1, vec![meeting]);
        let mut planner = DayPlanner::new(date(), window(), Some(&existing), &config);

        // 09:00-09:20 is too short for a 25 minute unit.
        let placed = planner.place_unit("t").unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].start_minute, 620);
    }

    #[test]
    fn returns_none_when_day_is_full() {
        let config = SchedulerConfig::default();
        let mut planner = DayPlanner::new(date(), TimeWindow::new(540, 590).unwrap(), None, &config);
        assert!(planner.place_unit("t").is_some());
        // 09:25 + 5 min break + 25 min unit = 09:55 > 09:50
        assert!(planner.place_unit("t").is_none());
    }

    #[test]
    fn free_gaps_reflect_occupancy() {
        let config = SchedulerConfig::default();
        let meeting = Slot::planned(date(), 600, SlotKind::Buffer, 30, Some("m"));
        let existing = DaySchedule::from_slots(date(), 1, vec![meeting]);
        let planner = DayPlanner::new(date(), window(), Some(&existing), &config);
        let gaps = planner.free_gaps();
        assert_eq!(gaps, vec![
            TimeWindow { start: 540, end: 600 },
            TimeWindow { start: 630, end: 720 },
        ]);
        assert_eq!(planner.free_minutes(), 150);
    }

    #[test]
    fn unit_never_runs_straight_into_existing_work() {
        let config = SchedulerConfig::default();
        let later = Slot::planned(date(), 565, SlotKind::Work, 25, Some("other"));
        let existing = DaySchedule::from_slots(date(), 1, vec![later]);
        let mut planner = DayPlanner::new(date(), window(), Some(&existing), &config);

        // 09:00-09:25 would end exactly where the 09:25 unit begins.
        let placed = planner.place_unit("t").unwrap();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].kind, SlotKind::ShortBreak);
        assert_eq!(placed[0].start_minute, 590);
        assert_eq!(placed[1].start_minute, 595);
    }

    #[test]
    fn full_day_is_refused_up_front() {
        let config = SchedulerConfig::default();
        let meeting = Slot::planned(date(), 540, SlotKind::Buffer, 170, Some("m"));
        let existing = DaySchedule::from_slots(date(), 1, vec![meeting]);
        let mut planner = DayPlanner::new(date(), window(), Some(&existing), &config);
        assert_eq!(planner.free_minutes(), 10);
        assert!(planner.place_unit("t").is_none());
    }

    #[test]
    fn buffer_follows_last_unit_when_enabled() {
        let config = SchedulerConfig {
            buffer_minutes: 10,
            ..SchedulerConfig::default()
        };
        let mut planner = DayPlanner::new(date(), window(), None, &config);
        let placed = planner.place_unit("a").unwrap();
        let buffer = planner.place_buffer(&placed[0], "a").unwrap();
        assert_eq!(buffer.start_minute, 565);
        assert_eq!(buffer.kind, SlotKind::Buffer);

        // The next task starts after the buffer without an extra break.
        let next = planner.place_unit("b").unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].start_minute, 575);
    }
}

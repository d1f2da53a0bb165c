//! The single owner of committed day schedules.
//!
//! Readers get snapshots. Writers hand back a replacement built from a
//! snapshot, and the store accepts it only if nobody committed that date in
//! between (optimistic concurrency on `DaySchedule::version`).

mod traits;

pub use traits::{DayPersistence, TaskStore};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schedule::{DateRange, DaySchedule};

type Backend = Box<dyn DayPersistence + Send>;

struct Inner {
    days: BTreeMap<NaiveDate, DaySchedule>,
    backend: Option<Backend>,
}

impl Inner {
    /// Cached day, loading it from the backend on first use.
    fn day(&mut self, date: NaiveDate) -> Result<&DaySchedule, StoreError> {
        if !self.days.contains_key(&date) {
            let loaded = match &self.backend {
                Some(backend) => backend.load_day(date)?,
                None => None,
            };
            let day = loaded.unwrap_or_else(|| DaySchedule::new(date));
            debug!(%date, version = day.version, "loaded day");
            self.days.insert(date, day);
        }
        self.days
            .get(&date)
            .ok_or_else(|| StoreError::InvalidSchedule {
                date,
                message: "day vanished from cache".into(),
            })
    }
}

/// Versioned, thread-safe store of day schedules.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct ScheduleStore {
    inner: Mutex<Inner>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    /// Memory-only store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                days: BTreeMap::new(),
                backend: None,
            }),
        }
    }

    /// Store that loads lazily from and saves through `backend`.
    pub fn with_persistence(backend: impl DayPersistence + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                days: BTreeMap::new(),
                backend: Some(Box::new(backend)),
            }),
        }
    }

    /// Snapshot of one date. Unknown dates come back empty at version 0.
    pub fn get_day(&self, date: NaiveDate) -> Result<DaySchedule, StoreError> {
        let mut inner = self.inner.lock();
        inner.day(date).cloned()
    }

    /// Snapshots of every date in `range`.
    pub fn days_in(&self, range: DateRange) -> Result<BTreeMap<NaiveDate, DaySchedule>, StoreError> {
        let mut inner = self.inner.lock();
        range
            .days()
            .map(|date| -> Result<_, StoreError> { Ok((date, inner.day(date)?.clone())) })
            .collect()
    }

    /// Date of the day holding `slot_id`, searching loaded days first.
    pub fn find_slot_date(&self, slot_id: &str) -> Result<Option<NaiveDate>, StoreError> {
        let inner = self.inner.lock();
        if let Some(day) = inner.days.values().find(|d| d.get(slot_id).is_some()) {
            return Ok(Some(day.date));
        }
        match &inner.backend {
            Some(backend) => Ok(backend
                .find_slot_date(slot_id)?
                .filter(|d| !inner.days.contains_key(d))),
            None => Ok(None),
        }
    }

    /// Atomically replace one day.
    ///
    /// Returns the committed copy carrying its new version.
    pub fn commit(&self, day: DaySchedule) -> Result<DaySchedule, StoreError> {
        let mut committed = self.commit_days(vec![day])?;
        committed.pop().ok_or_else(|| StoreError::InvalidSchedule {
            date: NaiveDate::MIN,
            message: "nothing committed".into(),
        })
    }

    /// Atomically replace several days: all of them or none.
    ///
    /// # Errors
    /// - [`StoreError::InvalidSchedule`] if a day breaks the day invariants or
    ///   a date appears twice
    /// - [`StoreError::StaleSchedule`] if a day was committed since it was read
    /// - [`StoreError::Persistence`] if the backend refused the write
    pub fn commit_days(&self, days: Vec<DaySchedule>) -> Result<Vec<DaySchedule>, StoreError> {
        let mut inner = self.inner.lock();

        let mut seen = std::collections::BTreeSet::new();
        for day in &days {
            if !seen.insert(day.date) {
                return Err(StoreError::InvalidSchedule {
                    date: day.date,
                    message: "date appears twice in one commit".into(),
                });
            }
            day.validate().map_err(|e| StoreError::InvalidSchedule {
                date: day.date,
                message: e.to_string(),
            })?;
            let current = inner.day(day.date)?.version;
            if current != day.version {
                warn!(date = %day.date, read = day.version, current, "stale commit rejected");
                return Err(StoreError::StaleSchedule {
                    date: day.date,
                    expected: day.version,
                    found: current,
                });
            }
        }

        let committed: Vec<DaySchedule> = days
            .into_iter()
            .map(|mut day| {
                day.version += 1;
                day
            })
            .collect();

        if let Some(backend) = &inner.backend {
            backend.save_days(&committed)?;
        }
        for day in &committed {
            inner.days.insert(day.date, day.clone());
        }
        info!(
            dates = committed.len(),
            slots = committed.iter().map(DaySchedule::len).sum::<usize>(),
            "committed schedule"
        );
        Ok(committed)
    }

    /// Every date holding a slot owned by `task_id`, ascending.
    pub fn dates_with_task(&self, task_id: &str) -> Result<Vec<NaiveDate>, StoreError> {
        let inner = self.inner.lock();
        let mut dates: Vec<NaiveDate> = inner
            .days
            .values()
            .filter(|d| d.iter().any(|s| s.belongs_to(task_id)))
            .map(|d| d.date)
            .collect();
        if let Some(backend) = &inner.backend {
            // Loaded days are authoritative over what the backend still holds.
            dates.extend(
                backend
                    .dates_with_task(task_id)?
                    .into_iter()
                    .filter(|d| !inner.days.contains_key(d)),
            );
        }
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    /// Drop every slot owned by `task_id`, on every date. Returns how many went.
    pub fn remove_task_slots(&self, task_id: &str) -> Result<usize, StoreError> {
        let dates = self.dates_with_task(task_id)?;

        let mut removed = 0;
        let mut replacements = Vec::with_capacity(dates.len());
        for date in dates {
            let mut day = self.get_day(date)?;
            removed += day.remove_task(task_id);
            replacements.push(day);
        }
        if removed > 0 {
            self.commit_days(replacements)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::schedule::{Slot, SlotKind};
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn work(start: u32, task: &str) -> Slot {
        Slot::planned(date(), start, SlotKind::Work, 25, Some(task))
    }

    #[test]
    fn unknown_day_is_empty_at_version_zero() {
        let store = ScheduleStore::new();
        let day = store.get_day(date()).unwrap();
        assert!(day.is_empty());
        assert_eq!(day.version, 0);
    }

    #[test]
    fn commit_bumps_version_and_rejects_stale_copies() {
        let store = ScheduleStore::new();
        let mut first = store.get_day(date()).unwrap();
        let mut second = first.clone();

        first.insert(work(540, "a"));
        let committed = store.commit(first).unwrap();
        assert_eq!(committed.version, 1);

        second.insert(work(600, "b"));
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, StoreError::StaleSchedule { expected: 0, found: 1, .. }));
        assert_eq!(store.get_day(date()).unwrap().len(), 1);
    }

    #[test]
    fn invalid_day_is_refused() {
        let store = ScheduleStore::new();
        let mut day = store.get_day(date()).unwrap();
        day.insert(work(540, "a"));
        day.insert(work(550, "b"));
        assert!(matches!(store.commit(day), Err(StoreError::InvalidSchedule { .. })));
        assert_eq!(store.get_day(date()).unwrap().version, 0);
    }

    #[test]
    fn commit_days_is_all_or_nothing() {
        let store = ScheduleStore::new();
        let tuesday = date().succ_opt().unwrap();
        store.commit(store.get_day(tuesday).unwrap()).unwrap();

        let mut monday = store.get_day(date()).unwrap();
        monday.insert(work(540, "a"));
        // Read at version 0 but Tuesday is already at 1.
        let stale_tuesday = DaySchedule::new(tuesday);
        assert!(store.commit_days(vec![monday, stale_tuesday]).is_err());
        assert!(store.get_day(date()).unwrap().is_empty());
    }

    #[test]
    fn remove_task_slots_spans_dates() {
        let store = ScheduleStore::new();
        let tuesday = date().succ_opt().unwrap();
        let mut monday = store.get_day(date()).unwrap();
        monday.insert(work(540, "a"));
        monday.insert(work(600, "b"));
        let mut tue = store.get_day(tuesday).unwrap();
        tue.insert(Slot::planned(tuesday, 540, SlotKind::Work, 25, Some("a")));
        store.commit_days(vec![monday, tue]).unwrap();

        assert_eq!(store.remove_task_slots("a").unwrap(), 2);
        assert_eq!(store.get_day(date()).unwrap().len(), 1);
        assert!(store.get_day(tuesday).unwrap().is_empty());
        assert_eq!(store.remove_task_slots("a").unwrap(), 0);
    }

    struct FailingBackend;

    impl DayPersistence for FailingBackend {
        fn load_day(&self, _date: NaiveDate) -> Result<Option<DaySchedule>, DatabaseError> {
            Ok(None)
        }
        fn save_days(&self, _days: &[DaySchedule]) -> Result<(), DatabaseError> {
            Err(DatabaseError::Locked)
        }
        fn find_slot_date(&self, _slot_id: &str) -> Result<Option<NaiveDate>, DatabaseError> {
            Ok(None)
        }
        fn dates_with_task(&self, _task_id: &str) -> Result<Vec<NaiveDate>, DatabaseError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn failed_save_leaves_memory_untouched() {
        let store = ScheduleStore::with_persistence(FailingBackend);
        let mut day = store.get_day(date()).unwrap();
        day.insert(work(540, "a"));
        assert!(matches!(store.commit(day), Err(StoreError::Persistence(DatabaseError::Locked))));
        assert!(store.get_day(date()).unwrap().is_empty());
    }

    #[test]
    fn concurrent_writers_see_exactly_one_winner() {
        let store = Arc::new(ScheduleStore::new());
        let snapshot = store.get_day(date()).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                let mut day = snapshot.clone();
                day.insert(work(540 + i * 30, "t"));
                std::thread::spawn(move || store.commit(day).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.get_day(date()).unwrap().version, 1);
    }

    #[test]
    fn find_slot_date_searches_loaded_days() {
        let store = ScheduleStore::new();
        let slot = work(540, "a");
        let mut day = store.get_day(date()).unwrap();
        day.insert(slot.clone());
        store.commit(day).unwrap();
        assert_eq!(store.find_slot_date(&slot.id).unwrap(), Some(date()));
        assert_eq!(store.find_slot_date("missing").unwrap(), None);
    }
}

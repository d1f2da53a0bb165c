//! End-to-end planning scenarios through the public API.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use pomoplan_core::{
    Allocator, ConflictError, ConflictResolver, CoreError, DateRange, DaySchedule, Event,
    LifecycleAction, Planner, PriorityClass, ScheduleDb, ScheduleStore, SchedulerConfig, Slot,
    SlotKind, SlotMove, SlotStatus, Task, TaskStore, UnscheduledReason, WorkingHours,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    monday().and_hms_opt(h, m, 0).unwrap()
}

fn morning() -> WorkingHours {
    WorkingHours::every_day(9 * 60, 12 * 60).unwrap()
}

fn task(id: &str, priority: PriorityClass, units: u32, order: i64) -> Task {
    Task::new(id, priority, units)
        .with_id(id)
        .with_created_at(Utc.timestamp_opt(1_700_000_000 + order, 0).unwrap())
}

#[test]
fn four_units_fit_a_morning() {
    let tasks = vec![task("report", PriorityClass::UrgentImportant, 4, 0)];
    let result = Allocator::new().schedule(
        &tasks,
        DateRange::single(monday()),
        &BTreeMap::new(),
        &morning(),
    );

    assert!(result.unscheduled.is_empty());
    let work: Vec<&Slot> = result.placed_slots.iter().filter(|s| s.is_work()).collect();
    let breaks: Vec<&Slot> = result
        .placed_slots
        .iter()
        .filter(|s| s.kind == SlotKind::ShortBreak)
        .collect();
    assert_eq!(work.len(), 4);
    assert_eq!(breaks.len(), 3);
    assert_eq!(result.placed_slots[0].start_minute, 9 * 60);
    let last = result.placed_slots.last().unwrap();
    assert_eq!(last.end_minute(), 10 * 60 + 55);
    assert!(result.placed_slots.iter().all(|s| s.status == SlotStatus::Scheduled));
}

#[test]
fn lower_priority_task_takes_what_is_left() {
    let tasks = vec![
        task("y", PriorityClass::ImportantNotUrgent, 3, 0),
        task("x", PriorityClass::UrgentImportant, 3, 1),
    ];
    let result = Allocator::new().schedule(
        &tasks,
        DateRange::single(monday()),
        &BTreeMap::new(),
        &morning(),
    );

    let placed = |id: &str| {
        result
            .placed_slots
            .iter()
            .filter(|s| s.is_work() && s.belongs_to(id))
            .count()
    };
    assert_eq!(placed("x"), 3);
    assert_eq!(placed("y"), 2);
    assert_eq!(result.unscheduled.len(), 1);
    let left = &result.unscheduled[0];
    assert_eq!(left.task_id, "y");
    assert_eq!(left.remaining_units, 1);
    assert_eq!(left.reason, UnscheduledReason::InsufficientCapacity);
    assert!(!left.urgent);

    // Every unit of x comes before every unit of y.
    let last_x = result.placed_slots.iter().filter(|s| s.belongs_to("x")).map(|s| s.start_minute).max();
    let first_y = result.placed_slots.iter().filter(|s| s.belongs_to("y")).map(|s| s.start_minute).min();
    assert!(last_x < first_y);
}

#[test]
fn move_onto_an_occupied_range_pushes_the_occupant() {
    let date = monday();
    let a = Slot::planned(date, 540, SlotKind::Work, 25, Some("a"));
    let b = Slot::planned(date, 600, SlotKind::Work, 25, Some("b"));
    let c = Slot::planned(date, 690, SlotKind::Work, 25, Some("c"));
    let day = DaySchedule::from_slots(date, 3, vec![a.clone(), b.clone(), c.clone()]);
    let resolver = ConflictResolver::new(morning());

    let moved = resolver.resolve(&day, &SlotMove::new(&a.id, date, 590)).unwrap();
    assert_eq!(moved.get(&a.id).unwrap().start_minute, 590);
    // 590..615 overlaps 600..625 by 15 minutes.
    assert_eq!(moved.get(&b.id).unwrap().start_minute, 615);
    assert_eq!(moved.get(&c.id).unwrap().start_minute, 690);
    assert_eq!(moved.version, 3);

    let err = resolver.resolve(&day, &SlotMove::new(&a.id, date, 11 * 60 + 40)).unwrap_err();
    assert!(matches!(err, ConflictError::OutsideWorkingHours { .. }));
    // Pushing c past 12:00 is not allowed, so the whole move fails.
    let err = resolver.resolve(&day, &SlotMove::new(&a.id, date, 685)).unwrap_err();
    assert!(matches!(err, ConflictError::Unresolvable { .. }));
    assert_eq!(day.get(&c.id).unwrap().start_minute, 690);
}

#[test]
fn planner_round_trip_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomoplan.db");
    let config = SchedulerConfig::default();

    let tasks_db = ScheduleDb::open_at(&path).unwrap();
    let focus = task("focus", PriorityClass::UrgentImportant, 2, 0);
    tasks_db.save_task(&focus).unwrap();

    let store = Arc::new(ScheduleStore::with_persistence(ScheduleDb::open_at(&path).unwrap()));
    let planner = Planner::with_parts(store, config.clone(), morning());
    let outcome = planner
        .plan(&tasks_db.list_tasks().unwrap(), DateRange::single(monday()), false, at(8, 0))
        .unwrap();
    assert_eq!(outcome.result.work_units_placed(), 2);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, Event::SchedulePlanned { placed_units: 2, .. })));
    let first = outcome.result.placed_slots[0].id.clone();

    planner
        .apply_action(&first, LifecycleAction::Complete, at(9, 30), &tasks_db)
        .unwrap();

    // A fresh planner over the same file sees the committed state.
    let reopened = Arc::new(ScheduleStore::with_persistence(ScheduleDb::open_at(&path).unwrap()));
    let planner = Planner::with_parts(reopened, config, morning());
    let day = planner.day(monday()).unwrap();
    assert_eq!(day.len(), 3);
    assert_eq!(day.get(&first).unwrap().status, SlotStatus::Completed);
    assert_eq!(tasks_db.get_task("focus").unwrap().unwrap().completed_work_units, 1);

    // Nothing left to place: one unit done, one still pending.
    let again = planner
        .plan(&tasks_db.list_tasks().unwrap(), DateRange::single(monday()), false, at(10, 0))
        .unwrap();
    assert!(again.result.placed_slots.is_empty());
    assert!(again.committed.is_empty());
}

#[test]
fn urgent_leftovers_raise_an_event() {
    let store = Arc::new(ScheduleStore::new());
    let planner = Planner::with_parts(store, SchedulerConfig::default(), morning());
    let tasks = vec![task("big", PriorityClass::UrgentImportant, 8, 0)];

    let outcome = planner
        .plan(&tasks, DateRange::spanning(monday(), 3), false, at(8, 0))
        .unwrap();

    // Urgent work may not spill into tomorrow.
    assert!(outcome.result.placed_slots.iter().all(|s| s.date == monday()));
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        Event::UrgentUnscheduled { task_id, .. } if task_id == "big"
    )));
}

#[test]
fn deleting_a_task_clears_its_slots() {
    let store = Arc::new(ScheduleStore::new());
    let planner = Planner::with_parts(Arc::clone(&store), SchedulerConfig::default(), morning());
    let tasks_db = ScheduleDb::open_memory().unwrap();
    let doomed = task("doomed", PriorityClass::UrgentImportant, 2, 0);
    tasks_db.save_task(&doomed).unwrap();

    planner.plan(&[doomed], DateRange::single(monday()), false, at(8, 0)).unwrap();
    let removed = planner.delete_task("doomed", &tasks_db).unwrap();
    assert_eq!(removed, 3);
    assert!(store.get_day(monday()).unwrap().is_empty());

    assert!(matches!(
        planner.delete_task("doomed", &tasks_db),
        Err(CoreError::TaskNotFound(_))
    ));
}

//! Schedule types: slots, day schedules and working-time windows.

mod day;
mod slot;
mod window;

pub use day::DaySchedule;
pub use slot::{Slot, SlotKind, SlotStatus};
pub use window::{format_clock, parse_clock, DateRange, TimeWindow, WorkingHours, MINUTES_PER_DAY};

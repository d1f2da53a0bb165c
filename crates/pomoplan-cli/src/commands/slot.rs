//! Slot commands: manual moves and lifecycle actions.

use clap::Subcommand;
use pomoplan_core::{parse_clock, LifecycleAction, SlotMove};

use super::{now_or, parse_date, print_slot, today, CliResult, Session};

#[derive(Subcommand)]
pub enum SlotAction {
    /// Move a slot to a new start time, pushing later slots back
    Move {
        /// Slot ID
        id: String,
        /// New start (HH:MM)
        time: String,
        /// Target date (default: the slot's current date)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        at: Option<String>,
    },
    /// Start a slot
    Start {
        id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Complete a slot
    Complete {
        id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Skip a slot (marks it missed)
    Skip {
        id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// List slots whose time has passed without being completed or skipped
    Overdue {
        /// Date (YYYY-MM-DD, default: today)
        date: Option<String>,
        #[arg(long)]
        at: Option<String>,
    },
}

pub fn run(action: SlotAction) -> CliResult {
    let session = Session::open()?;

    match action {
        SlotAction::Move { id, time, date, at } => {
            let new_date = match date.as_deref() {
                Some(value) => parse_date(value)?,
                None => session
                    .planner
                    .store()
                    .find_slot_date(&id)?
                    .ok_or_else(|| format!("slot not found: {id}"))?,
            };
            let mv = SlotMove::new(id, new_date, parse_clock(&time)?);
            let outcome = session.planner.move_slot(&mv, now_or(at.as_deref())?)?;
            for day in &outcome.committed {
                println!("{}", day.date);
                for slot in day.iter() {
                    print_slot(slot, &session.db);
                }
            }
        }
        SlotAction::Start { id, at } => act(&session, &id, LifecycleAction::Start, at)?,
        SlotAction::Complete { id, at } => act(&session, &id, LifecycleAction::Complete, at)?,
        SlotAction::Skip { id, at } => act(&session, &id, LifecycleAction::Skip, at)?,
        SlotAction::Overdue { date, at } => {
            let date = match date.as_deref() {
                Some(value) => parse_date(value)?,
                None => today(),
            };
            let overdue = session.planner.overdue(date, now_or(at.as_deref())?)?;
            if overdue.is_empty() {
                println!("No overdue slots.");
            }
            for slot in &overdue {
                print_slot(slot, &session.db);
            }
        }
    }
    Ok(())
}

fn act(session: &Session, id: &str, action: LifecycleAction, at: Option<String>) -> CliResult {
    let now = now_or(at.as_deref())?;
    let outcome = session.planner.apply_action(id, action, now, &session.db)?;
    print_slot(&outcome.transition.slot, &session.db);
    if let Some(task) = outcome.task {
        println!(
            "{}: {}/{} units done",
            task.title, task.completed_work_units, task.total_work_units
        );
    }
    Ok(())
}

//! `pomoplan plan`: run the allocator over a date range and commit.

use clap::Args;
use pomoplan_core::{DateRange, Event, Slot, TaskAllocation, TaskStore, Unscheduled};
use serde::Serialize;

use super::{now_or, parse_date, print_slot, today, CliResult, Session};

#[derive(Args)]
pub struct PlanArgs {
    /// First date to plan (default: today)
    #[arg(long)]
    from: Option<String>,
    /// Number of days to plan
    #[arg(long, default_value_t = 1)]
    days: u32,
    /// Drop still-scheduled slots in the range and plan them again
    #[arg(long)]
    replace: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
    /// Pretend the current time is this (YYYY-MM-DDTHH:MM)
    #[arg(long)]
    at: Option<String>,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    placed_slots: &'a [Slot],
    unscheduled: &'a [Unscheduled],
    allocations: &'a [TaskAllocation],
    events: &'a [Event],
}

pub async fn run(args: PlanArgs) -> CliResult {
    let session = Session::open()?;
    let start = match args.from.as_deref() {
        Some(value) => parse_date(value)?,
        None => today(),
    };
    let horizon = DateRange::spanning(start, args.days.max(1));
    let now = now_or(args.at.as_deref())?;
    let tasks = session.db.list_tasks()?;
    let replace = args.replace;

    // Allocation is CPU-bound and touches SQLite; keep it off the runtime threads.
    let (session, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = session.planner.plan(&tasks, horizon, replace, now);
        (session, outcome)
    })
    .await?;
    let outcome = outcome?;

    if args.json {
        let report = PlanReport {
            placed_slots: &outcome.result.placed_slots,
            unscheduled: &outcome.result.unscheduled,
            allocations: &outcome.result.allocations,
            events: &outcome.events,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if outcome.result.placed_slots.is_empty() {
        println!("Nothing new to place.");
    }
    let mut current = None;
    for slot in &outcome.result.placed_slots {
        if current != Some(slot.date) {
            println!("{}", slot.date);
            current = Some(slot.date);
        }
        print_slot(slot, &session.db);
    }

    for left in &outcome.result.unscheduled {
        let title = session
            .db
            .get_task(&left.task_id)?
            .map(|t| t.title)
            .unwrap_or_else(|| left.task_id.clone());
        println!(
            "unscheduled: {title}: {} unit(s), {}{}",
            left.remaining_units,
            left.reason.as_str(),
            if left.urgent { " [urgent]" } else { "" }
        );
    }
    Ok(())
}

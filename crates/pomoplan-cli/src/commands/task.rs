//! Task management commands for CLI.

use clap::Subcommand;
use pomoplan_core::{PriorityClass, Task, TaskStore};

use super::{parse_date, CliResult, Session};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Priority: ui, inu, uni, n (or full names)
        #[arg(long, default_value = "important_not_urgent")]
        priority: PriorityClass,
        /// Estimated work units (pomodoros)
        #[arg(long, default_value_t = 1)]
        units: u32,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Never place this task automatically
        #[arg(long, conflicts_with = "auto")]
        no_auto: bool,
        /// Place this task automatically even if its priority would not
        #[arg(long)]
        auto: bool,
        /// Opaque project reference
        #[arg(long)]
        project: Option<String>,
        /// Output the created task as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tasks
    List {
        /// Include finished tasks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one task as JSON
    Show {
        /// Task ID
        id: String,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<PriorityClass>,
        #[arg(long)]
        units: Option<u32>,
        #[arg(long)]
        due: Option<String>,
        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        #[arg(long)]
        auto_schedule: Option<bool>,
        #[arg(long)]
        project: Option<String>,
    },
    /// Delete a task and all of its slots
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let session = Session::open()?;
    let db = &session.db;

    match action {
        TaskAction::Add {
            title,
            priority,
            units,
            due,
            no_auto,
            auto,
            project,
            json,
        } => {
            let mut task = Task::new(title, priority, units);
            if let Some(due) = due {
                task = task.with_due_date(parse_date(&due)?);
            }
            if no_auto || auto {
                task = task.with_auto_schedule(auto);
            }
            if let Some(project) = project {
                task = task.with_project(project);
            }
            db.save_task(&task)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Task created: {}", task.id);
            }
        }
        TaskAction::List { all, json } => {
            let tasks: Vec<Task> = db
                .list_tasks()?
                .into_iter()
                .filter(|t| all || !t.is_done())
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for t in &tasks {
                    println!(
                        "{}  {:<22}  {}/{}  {}{}  {}",
                        t.id,
                        t.priority.as_str(),
                        t.completed_work_units,
                        t.total_work_units,
                        t.due_date.map(|d| format!("due {d}  ")).unwrap_or_default(),
                        if t.auto_schedule { "auto" } else { "manual" },
                        t.title
                    );
                }
            }
        }
        TaskAction::Show { id } => {
            let task = db.get_task(&id)?.ok_or_else(|| format!("task not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Update {
            id,
            title,
            priority,
            units,
            due,
            clear_due,
            auto_schedule,
            project,
        } => {
            let mut task = db.get_task(&id)?.ok_or_else(|| format!("task not found: {id}"))?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            if let Some(units) = units {
                task.total_work_units = units;
            }
            if let Some(due) = due {
                task.due_date = Some(parse_date(&due)?);
            }
            if clear_due {
                task.due_date = None;
            }
            if let Some(auto_schedule) = auto_schedule {
                task.auto_schedule = auto_schedule;
            }
            if let Some(project) = project {
                task.project_ref = Some(project);
            }
            db.save_task(&task)?;
            let trimmed = session.planner.reconcile_task(&task)?;
            if trimmed > 0 {
                eprintln!("Dropped {trimmed} surplus work unit(s) from the schedule");
            }
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Delete { id } => {
            let removed = session.planner.delete_task(&id, db)?;
            println!("Task deleted: {id} ({removed} slot(s) removed)");
        }
    }
    Ok(())
}

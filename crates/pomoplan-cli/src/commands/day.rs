use clap::Subcommand;

use super::{parse_date, print_slot, today, CliResult, Session};

#[derive(Subcommand)]
pub enum DayAction {
    /// Show the slots of one date
    Show {
        /// Date (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: DayAction) -> CliResult {
    let session = Session::open()?;

    match action {
        DayAction::Show { date, json } => {
            let date = match date.as_deref() {
                Some(value) => parse_date(value)?,
                None => today(),
            };
            let day = session.planner.day(date)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&day)?);
                return Ok(());
            }
            let focus = day.focus_minutes();
            println!("{date} (version {}, {focus} focus minutes)", day.version);
            if day.is_empty() {
                println!("No slots.");
            }
            for slot in day.iter() {
                print_slot(slot, &session.db);
            }
        }
    }
    Ok(())
}

mod config;
pub mod migrations;
pub mod schedule_db;

pub use config::Config;
pub use schedule_db::ScheduleDb;

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `POMOPLAN_DATA_DIR` wins when set. Otherwise `~/.config/pomoplan[-dev]/`,
/// with the `-dev` suffix when `POMOPLAN_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("POMOPLAN_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOPLAN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomoplan-dev")
            } else {
                base_dir.join("pomoplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a file-backed task store and print the funnel group sizes.
//! - Seed the demo set on first run so the output is never empty.
//!
//! Usage: `spot_cli [DB_PATH] [LOG_DIR]`; `LOG_DIR` must be absolute.

use spot_core::{Stage, SqliteKvRepository, TaskStore};
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "spot.sqlite3";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    if let Some(log_dir) = args.next() {
        if let Err(err) = spot_core::init_logging(spot_core::default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let repo = match SqliteKvRepository::open(&db_path) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("failed to open `{db_path}`: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut store = TaskStore::new(repo);
    if store.is_empty() {
        let added = store.seed_demo_tasks();
        log::info!("event=cli_seed module=cli status=ok added={added}");
    }

    println!("spot_core version={}", spot_core::core_version());
    println!("tasks={}", store.len());
    for stage in Stage::ALL {
        let counts: Vec<String> = stage
            .groups()
            .into_iter()
            .map(|zone| format!("{zone}={}", store.stage_view(zone).len()))
            .collect();
        println!("{} {}", stage.as_str(), counts.join(" "));
    }

    if let Some(err) = store.last_persist_error() {
        eprintln!("warning: changes were not saved: {err}");
    }
    ExitCode::SUCCESS
}

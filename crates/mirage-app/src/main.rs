//! mirage headless entry point.
//!
//! Boots the workspace from a TOML config (first argument, or the
//! `MIRAGE_CONFIG` environment variable), prints the desktop, then reads
//! commands from stdin until `quit` or end of input. Type `help` for the
//! command list.

mod app_state;
mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use app_state::AppState;
use commands::CommandOutput;
use mirage_types::config::MirageConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MIRAGE_CONFIG").ok())
        .map(PathBuf::from);
    let config = match &config_path {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            MirageConfig::load(path)?
        },
        None => MirageConfig::default(),
    };
    log::info!(
        "Starting mirage (desktop {}, workspace {})",
        config.desktop_root,
        config.workspace_root
    );

    let app = AppState::boot(config)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in commands::describe(&app.desktop.render()) {
        writeln!(stdout, "{line}")?;
    }

    for line in stdin.lock().lines() {
        let line = line?;
        match commands::execute(&line, &app) {
            Ok(CommandOutput::Lines(lines)) => {
                for l in lines {
                    writeln!(stdout, "{l}")?;
                }
            },
            Ok(CommandOutput::None) => {},
            Ok(CommandOutput::Quit) => break,
            Err(e) => writeln!(stdout, "error: {e}")?,
        }
        stdout.flush()?;
    }

    if let Err(e) = app.save() {
        log::warn!("Workspace not saved on exit: {e:#}");
    }
    log::info!("mirage shut down");
    Ok(())
}

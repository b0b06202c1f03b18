//! Swaps a staged update into place once the application has exited, then
//! starts the new build.
//!
//! Usage: `marwan-applier <update_file> <app_executable>`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use marwan_platform::AppPaths;
use marwan_platform::logging::{LogOptions, TerminalOutput, init_logging};
use marwan_update::apply::{Applier, SystemProbe, platform_relaunch};

const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Parser)]
#[command(version, about = "Applies a downloaded Marwan Management CRM update")]
struct Args {
    /// Staged update file (an executable or a .zip archive)
    update_file: PathBuf,
    /// Installed application executable to replace
    app_executable: PathBuf,
}

fn log_path() -> PathBuf {
    AppPaths::new().map_or_else(
        |_| std::env::temp_dir().join("marwan-applier.log"),
        |paths| paths.applier_log_file(),
    )
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&LogOptions {
        log_path: log_path(),
        max_log_size: MAX_LOG_SIZE,
        verbose: false,
        terminal: TerminalOutput::Mixed,
    });

    info!("Marwan Management CRM updater {}", env!("CARGO_PKG_VERSION"));

    let applier = Applier::new(
        args.update_file,
        args.app_executable,
        Box::new(SystemProbe::new()),
        platform_relaunch(),
    );

    match applier.run() {
        Ok(report) => {
            if let Some(backup) = report.backup {
                info!("Previous version kept at {}", backup.display());
            }
            info!("Update completed successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Update failed during {}: {err}", err.stage());
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use marwan_crm::{APP_VERSION, AcquireError, App, AppError, Cli, SingleInstance};
use marwan_platform::AppPaths;
use marwan_platform::logging::{LogOptions, TerminalOutput, init_logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("{}", AppError::startup("paths", error));
            return ExitCode::FAILURE;
        }
    };

    let mut app = match App::load(paths.clone()) {
        Ok(app) => app,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&LogOptions {
        log_path: paths.log_file(),
        max_log_size: app.settings().max_log_size_bytes,
        verbose: cli.verbose || app.settings().debug_logging,
        terminal: if cfg!(debug_assertions) {
            TerminalOutput::Stderr
        } else {
            TerminalOutput::Off
        },
    });
    info!("Marwan Management CRM {APP_VERSION} starting: {command:?}");

    let _instance = if command.needs_instance_lock() {
        match SingleInstance::acquire(&paths.instance_lock_file()) {
            Ok(guard) => Some(guard),
            Err(AcquireError::AlreadyRunning) => {
                eprintln!("Marwan Management CRM is already running");
                return ExitCode::FAILURE;
            }
            Err(error) => {
                warn!("Continuing without instance lock: {error}");
                None
            }
        }
    } else {
        None
    };

    match app.execute(command, &mut std::io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

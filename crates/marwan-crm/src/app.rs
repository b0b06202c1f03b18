//! Command handlers for the host application.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use marwan_platform::AppPaths;
use marwan_update::{ReleaseRegistry, ReleaseSource, download_client};

use crate::cli::{Command, ConfigCommand};
use crate::error::AppError;
use crate::lifecycle::{AppLifecycle, ConsoleMain, ConsoleSplash, Surface};
use crate::settings::AppSettings;
use crate::update_controller::{UpdateConfig, UpdateController, UpdateState};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct App {
    paths: AppPaths,
    settings: AppSettings,
    source: Arc<dyn ReleaseSource>,
}

impl App {
    /// Load settings from the platform config directory and prepare the
    /// release registry client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn load(paths: AppPaths) -> Result<Self, AppError> {
        let settings = AppSettings::load_from(&paths.settings_file());
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| AppError::startup("http client", error.to_string()))?;
        let registry = ReleaseRegistry::new(client)
            .with_timeout(Duration::from_secs(settings.http_timeout_secs));

        Ok(Self {
            paths,
            settings,
            source: Arc::new(registry),
        })
    }

    #[must_use]
    pub fn with_release_source(mut self, source: Arc<dyn ReleaseSource>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// # Errors
    /// Returns the failure of the command; output already written is kept.
    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<(), AppError> {
        match command {
            Command::Run => self.run(out),
            Command::Check => self.check(out).map(|_| ()),
            Command::Update { open_release } => self.update(open_release, out),
            Command::Version => {
                writeln!(out, "marwan-crm {APP_VERSION}")?;
                Ok(())
            }
            Command::Config { action } => self.config(action, out),
        }
    }

    fn run(&mut self, out: &mut impl Write) -> Result<(), AppError> {
        let mut lifecycle = AppLifecycle::new(ConsoleSplash, ConsoleMain::new(APP_VERSION));
        lifecycle.start();

        lifecycle.report("Loading settings...", 25);
        if !self.settings.is_setup_complete() || self.settings.should_rerun_setup() {
            warn!(
                "First-run setup required (complete: {}, config version: {})",
                self.settings.setup_complete, self.settings.config_version
            );
            lifecycle.report("Setup has not been completed; using default settings", 50);
        }

        lifecycle.report("Preparing directories...", 75);
        self.paths
            .ensure_dirs()
            .map_err(|error| AppError::startup("directories", error))?;

        lifecycle.report("Ready", 100);
        lifecycle.transition_to_main();

        if self.settings.check_updates_on_startup
            && let Some(latest) = self.startup_check()
            && let Some(main) = lifecycle.main_surface()
        {
            main.update_status(
                &format!("Update available: v{latest}. Run `marwan-crm update` to install it."),
                100,
            );
        }

        lifecycle.shutdown();
        out.flush()?;
        Ok(())
    }

    fn check(&mut self, out: &mut impl Write) -> Result<UpdateState, AppError> {
        let mut controller = self.update_controller()?;
        let state = self.check_with(&mut controller)?;

        match &state {
            UpdateState::Available => {
                if let Some(update) = controller.available() {
                    writeln!(
                        out,
                        "Update available: {} -> {}",
                        update.current_version, update.latest_version
                    )?;
                    if !update.release_notes().trim().is_empty() {
                        writeln!(out, "\n{}", update.release_notes().trim())?;
                    }
                }
            }
            UpdateState::UpToDate { latest_version } => {
                writeln!(
                    out,
                    "Marwan Management CRM {APP_VERSION} is up to date (latest release: {latest_version})"
                )?;
            }
            _ => {}
        }
        Ok(state)
    }

    fn update(&mut self, open_release: bool, out: &mut impl Write) -> Result<(), AppError> {
        let mut controller = self.update_controller()?;
        match self.check_with(&mut controller)? {
            UpdateState::UpToDate { latest_version } => {
                writeln!(out, "Already running the latest version ({latest_version})")?;
                return Ok(());
            }
            UpdateState::Available => {}
            other => {
                return Err(AppError::Message(format!(
                    "unexpected update state after check: {other:?}"
                )));
            }
        }

        if let Some(update) = controller.available() {
            writeln!(
                out,
                "Updating {} -> {}",
                update.current_version, update.latest_version
            )?;
        }

        if let Err(error) = controller.start_download() {
            if let AppError::NoAssetFound {
                release_url: Some(url),
                ..
            } = &error
                && open_release
            {
                info!("Opening release page {url}");
                if let Err(open_error) = open::that(url) {
                    warn!("Failed to open release page: {open_error}");
                }
            }
            return Err(error);
        }

        controller.wait_until_idle(|state| {
            if let UpdateState::Downloading {
                percent: Some(percent),
            } = state
            {
                eprint!("\rDownloading... {percent:>5.1}%");
            }
        });
        eprintln!();

        if let UpdateState::Failed(error) = controller.state() {
            return Err(error.clone());
        }

        let app_executable = std::env::current_exe().map_err(AppError::handoff_failed)?;
        controller.hand_off(&app_executable)?;

        writeln!(
            out,
            "Installer started. Marwan Management CRM will restart when the update is applied."
        )?;
        Ok(())
    }

    fn config(&mut self, action: ConfigCommand, out: &mut impl Write) -> Result<(), AppError> {
        match action {
            ConfigCommand::Show => {
                let rendered = serde_json::to_string_pretty(&self.settings)
                    .map_err(|error| AppError::settings("show", error.to_string()))?;
                writeln!(out, "{rendered}")?;
            }
            ConfigCommand::Get { key } => {
                let value = self
                    .settings
                    .get(&key)
                    .ok_or_else(|| AppError::settings("get", format!("unknown setting '{key}'")))?;
                writeln!(out, "{value}")?;
            }
            ConfigCommand::Set { key, value } => {
                self.settings
                    .set(&key, &value)
                    .map_err(|error| AppError::settings("set", error))?;
                self.settings
                    .save_to(&self.paths.settings_file())
                    .map_err(|error| AppError::settings("save", error))?;
                writeln!(out, "{key} updated")?;
            }
        }
        Ok(())
    }

    fn update_controller(&self) -> Result<UpdateController, AppError> {
        let client = download_client(Duration::from_secs(
            self.settings.download_connect_timeout_secs,
        ))
        .map_err(AppError::download_failed)?;

        Ok(UpdateController::new(
            UpdateConfig {
                current_version: APP_VERSION.to_string(),
                repository: self.settings.update_repository.clone(),
                staging_dir: self.paths.staging_dir(),
                preferred_suffix: None,
            },
            Arc::clone(&self.source),
            client,
        ))
    }

    /// Run a check to completion and remember when it happened.
    fn check_with(&mut self, controller: &mut UpdateController) -> Result<UpdateState, AppError> {
        controller.start_check()?;
        controller.wait_until_idle(|_| {});

        self.settings.record_update_check(Utc::now());
        if let Err(error) = self.settings.save_to(&self.paths.settings_file()) {
            warn!("Failed to record update check time: {error}");
        }

        match controller.state() {
            UpdateState::Failed(error) => Err(error.clone()),
            state => Ok(state.clone()),
        }
    }

    /// Startup check: failures are logged and otherwise ignored. Returns the
    /// newer version when one is published.
    fn startup_check(&mut self) -> Option<String> {
        let mut controller = match self.update_controller() {
            Ok(controller) => controller,
            Err(error) => {
                warn!("Skipping startup update check: {error}");
                return None;
            }
        };

        match self.check_with(&mut controller) {
            Ok(UpdateState::Available) => controller
                .available()
                .map(|update| update.latest_version.clone()),
            Ok(_) => None,
            Err(error) => {
                warn!("Startup update check failed: {error}");
                None
            }
        }
    }
}

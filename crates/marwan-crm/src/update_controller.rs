//! Background update checks and downloads.
//!
//! Network work runs on a dedicated thread with its own current-thread
//! runtime. Results come back as [`UpdateEvent`]s over a channel and are
//! applied to [`UpdateState`] on the thread that owns the controller, so the
//! state is never shared.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use marwan_update::{
    AvailableUpdate, ReleaseSource, UpdateCheck, UpdatePackage, check_for_update, launch_applier,
    select_asset, select_platform_asset, stage_update,
};

use crate::error::AppError;

#[derive(Debug)]
pub enum UpdateEvent {
    Checked(UpdateCheck),
    Progress(f64),
    Staged(UpdatePackage),
    Failed(AppError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum UpdateState {
    #[default]
    Idle,
    Checking,
    UpToDate {
        latest_version: String,
    },
    Available,
    Downloading {
        percent: Option<f64>,
    },
    Staged(UpdatePackage),
    HandedOff,
    Failed(AppError),
}

impl UpdateState {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Checking | Self::Downloading { .. })
    }
}

/// Inputs the controller needs from the host; the update core never reads
/// the settings store itself.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub current_version: String,
    pub repository: String,
    pub staging_dir: PathBuf,
    /// Asset name suffix to download; `None` picks the running platform's.
    pub preferred_suffix: Option<String>,
}

const EVENT_WAIT: Duration = Duration::from_millis(250);

pub struct UpdateController {
    config: UpdateConfig,
    source: Arc<dyn ReleaseSource>,
    client: reqwest::Client,
    state: UpdateState,
    available: Option<AvailableUpdate>,
    events: Option<Receiver<UpdateEvent>>,
}

impl UpdateController {
    pub fn new(
        config: UpdateConfig,
        source: Arc<dyn ReleaseSource>,
        download_client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            source,
            client: download_client,
            state: UpdateState::Idle,
            available: None,
            events: None,
        }
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// The most recent update found by a check.
    pub fn available(&self) -> Option<&AvailableUpdate> {
        self.available.as_ref()
    }

    /// Ask the registry for the latest release in the background.
    ///
    /// # Errors
    /// Returns [`AppError::UpdateInProgress`] while another check or download
    /// is running.
    pub fn start_check(&mut self) -> Result<(), AppError> {
        if self.state.is_busy() {
            return Err(AppError::UpdateInProgress);
        }

        let source = Arc::clone(&self.source);
        let current_version = self.config.current_version.clone();
        let repository = self.config.repository.clone();

        self.state = UpdateState::Checking;
        self.spawn_worker(move |tx| async move {
            let check = check_for_update(source.as_ref(), &current_version, &repository).await;
            let _ = tx.send(UpdateEvent::Checked(check));
        });
        Ok(())
    }

    /// Download the asset for this platform from the last available update.
    ///
    /// # Errors
    /// Returns [`AppError::UpdateInProgress`] while busy,
    /// [`AppError::NoUpdateAvailable`] before a successful check, and
    /// [`AppError::NoAssetFound`] when the release has nothing for this
    /// platform.
    pub fn start_download(&mut self) -> Result<(), AppError> {
        if self.state.is_busy() {
            return Err(AppError::UpdateInProgress);
        }
        let Some(update) = self.available.clone() else {
            return Err(AppError::NoUpdateAvailable);
        };
        let selected = match &self.config.preferred_suffix {
            Some(suffix) => select_asset(&update.release, suffix),
            None => select_platform_asset(&update.release),
        };
        let Some(asset) = selected.cloned() else {
            return Err(AppError::no_asset_found(
                update.latest_version.clone(),
                update.release_url(),
            ));
        };

        let client = self.client.clone();
        let staging_dir = self.config.staging_dir.clone();

        info!("Downloading update asset {}", asset.name);
        self.state = UpdateState::Downloading { percent: None };
        self.spawn_worker(move |tx| async move {
            let progress_tx = tx.clone();
            let result = stage_update(&client, &update.release, &asset, &staging_dir, |pct| {
                let _ = progress_tx.send(UpdateEvent::Progress(pct));
            })
            .await;

            let event = match result {
                Ok(package) => UpdateEvent::Staged(package),
                Err(error) => UpdateEvent::Failed(AppError::download_failed(error)),
            };
            let _ = tx.send(event);
        });
        Ok(())
    }

    /// Launch the applier installed next to the running executable for the
    /// staged update. The caller should exit promptly afterwards so the
    /// executable can be replaced.
    ///
    /// # Errors
    /// Returns [`AppError::NothingToInstall`] unless an update is staged, or
    /// [`AppError::HandoffFailed`] if the applier cannot be started; the
    /// staged file is kept in that case.
    pub fn hand_off(&mut self, app_executable: &Path) -> Result<(), AppError> {
        let UpdateState::Staged(package) = &self.state else {
            return Err(AppError::NothingToInstall);
        };

        launch_applier(&package.staged_path, app_executable).map_err(AppError::handoff_failed)?;
        self.state = UpdateState::HandedOff;
        Ok(())
    }

    /// Block until the running operation finishes, calling `on_change` after
    /// every state change.
    pub fn wait_until_idle(&mut self, mut on_change: impl FnMut(&UpdateState)) {
        while self.state.is_busy() {
            let Some(rx) = self.events.as_ref() else {
                break;
            };
            match rx.recv_timeout(EVENT_WAIT) {
                Ok(event) => {
                    self.apply(event);
                    on_change(&self.state);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.apply(UpdateEvent::Failed(AppError::Message(
                        "update worker stopped unexpectedly".to_string(),
                    )));
                    on_change(&self.state);
                }
            }
        }
    }

    fn apply(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Checked(UpdateCheck::Available(update)) => {
                self.available = Some(update);
                self.state = UpdateState::Available;
            }
            UpdateEvent::Checked(UpdateCheck::UpToDate { latest_version }) => {
                self.available = None;
                self.state = UpdateState::UpToDate { latest_version };
            }
            UpdateEvent::Checked(UpdateCheck::Failed(failure)) => {
                self.state = UpdateState::Failed(AppError::update_check_failed(failure));
            }
            UpdateEvent::Progress(pct) => {
                if let UpdateState::Downloading { percent } = &mut self.state {
                    *percent = Some(pct);
                }
            }
            UpdateEvent::Staged(package) => {
                info!("Update staged at {}", package.staged_path.display());
                self.state = UpdateState::Staged(package);
            }
            UpdateEvent::Failed(error) => {
                warn!("Update operation failed: {error}");
                self.state = UpdateState::Failed(error);
            }
        }
    }

    fn spawn_worker<F, Fut>(&mut self, job: F)
    where
        F: FnOnce(Sender<UpdateEvent>) -> Fut + Send + 'static,
        Fut: Future<Output = ()>,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.events = Some(rx);

        let spawned = std::thread::Builder::new()
            .name("update-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(error) => {
                        let _ = tx.send(UpdateEvent::Failed(AppError::Message(format!(
                            "failed to start update runtime: {error}"
                        ))));
                        return;
                    }
                };
                runtime.block_on(job(tx));
                debug!("Update worker finished");
            });

        if let Err(error) = spawned {
            self.events = None;
            self.state = UpdateState::Failed(AppError::Message(format!(
                "failed to start update worker: {error}"
            )));
        }
    }
}

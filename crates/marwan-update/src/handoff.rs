use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::info;
use marwan_platform::{Detach, executable_name};
use thiserror::Error;

/// File stem of the applier binary shipped next to the application.
pub const APPLIER_STEM: &str = "marwan-applier";

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("update applier not found at {}", path.display())]
    ApplierMissing { path: PathBuf },
    #[error("failed to resolve the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to launch update applier {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Launches the applier that swaps in a staged update after this process
/// exits.
#[derive(Debug, Clone)]
pub struct Handoff {
    applier_path: PathBuf,
}

impl Handoff {
    /// Look for the applier in `app_dir`.
    #[must_use]
    pub fn in_dir(app_dir: &Path) -> Self {
        Self {
            applier_path: app_dir.join(executable_name(APPLIER_STEM)),
        }
    }

    /// Look for the applier next to the running executable.
    ///
    /// # Errors
    /// Returns an error if the running executable cannot be resolved.
    pub fn for_current_exe() -> Result<Self, HandoffError> {
        let exe = std::env::current_exe().map_err(HandoffError::CurrentExe)?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::in_dir(dir))
    }

    #[must_use]
    pub fn applier_path(&self) -> &Path {
        &self.applier_path
    }

    /// Start the applier with `update_file` and `app_executable` as its only
    /// arguments and return without waiting for it.
    ///
    /// # Errors
    /// Returns [`HandoffError::ApplierMissing`] when the applier binary is not
    /// installed, or [`HandoffError::Spawn`] if the process cannot start.
    pub fn launch(&self, update_file: &Path, app_executable: &Path) -> Result<(), HandoffError> {
        if !self.applier_path.is_file() {
            return Err(HandoffError::ApplierMissing {
                path: self.applier_path.clone(),
            });
        }

        info!(
            "Launching applier {} for {}",
            self.applier_path.display(),
            app_executable.display()
        );

        let child = Command::new(&self.applier_path)
            .arg(update_file)
            .arg(app_executable)
            .stdin(Stdio::null())
            .detach_with_console()
            .spawn()
            .map_err(|source| HandoffError::Spawn {
                path: self.applier_path.clone(),
                source,
            })?;

        info!("Applier started with pid {}", child.id());
        Ok(())
    }
}

/// Hand `update_file` to the applier installed next to the running
/// executable.
///
/// # Errors
/// See [`Handoff::launch`].
pub fn launch_applier(update_file: &Path, app_executable: &Path) -> Result<(), HandoffError> {
    Handoff::for_current_exe()?.launch(update_file, app_executable)
}

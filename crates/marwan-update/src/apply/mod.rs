//! Replacing an installed executable with a staged update.
//!
//! [`Applier`] runs in a separate process after the host has exited. It moves
//! through [`ApplyStage`]s in order and stops at the first fatal error:
//!
//! 1. `AwaitExit`: wait for the old executable to stop running.
//! 2. `Backup`: copy it to `<stem>_backup<.ext>` (best effort).
//! 3. `Replace`: install the staged file, extracting it first if it is a
//!    `.zip` archive.
//! 4. `RestorePermissions`: mark the new file executable on Unix.
//! 5. `Cleanup`: delete the staged file (best effort).
//! 6. `Relaunch`: start the updated application.

mod archive;
mod probe;
mod relaunch;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

pub use probe::{ProcessProbe, SystemProbe};
#[cfg(unix)]
pub use relaunch::ReplaceImage;
pub use relaunch::{Relaunch, SpawnDetached, platform_relaunch};

use crate::asset::ARCHIVE_SUFFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    AwaitExit,
    Backup,
    Replace,
    RestorePermissions,
    Cleanup,
    Relaunch,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AwaitExit => "await exit",
            Self::Backup => "backup",
            Self::Replace => "replace",
            Self::RestorePermissions => "restore permissions",
            Self::Cleanup => "cleanup",
            Self::Relaunch => "relaunch",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("application executable not found: {}", path.display())]
    TargetMissing { path: PathBuf },
    #[error("staged update file not found: {}", path.display())]
    StagedFileMissing { path: PathBuf },
    #[error("archive {} does not contain {name}", archive.display())]
    ArchiveMissingExecutable { archive: PathBuf, name: String },
    #[error("{stage} failed: {context}: {source}")]
    Io {
        stage: ApplyStage,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ApplyError {
    fn io(stage: ApplyStage, context: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            context,
            source,
        }
    }

    fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    fn io_with_path(
        stage: ApplyStage,
        context: &'static str,
        path: &Path,
        source: &std::io::Error,
    ) -> Self {
        Self::io(
            stage,
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }

    /// Stage in which the error occurred.
    #[must_use]
    pub fn stage(&self) -> ApplyStage {
        match self {
            Self::TargetMissing { .. } => ApplyStage::AwaitExit,
            Self::StagedFileMissing { .. }
            | Self::ArchiveMissingExecutable { .. }
            | Self::Zip { .. } => ApplyStage::Replace,
            Self::Io { stage, .. } => *stage,
        }
    }
}

/// The installed executable and where its backup goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableTarget {
    pub current_path: PathBuf,
    pub backup_path: PathBuf,
}

impl ExecutableTarget {
    #[must_use]
    pub fn new(current_path: PathBuf) -> Self {
        let backup_path = backup_path_for(&current_path);
        Self {
            current_path,
            backup_path,
        }
    }

    /// File name of the executable as it appears in the process table.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.current_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_backup.{}", ext.to_string_lossy()),
        None => format!("{stem}_backup"),
    };
    path.with_file_name(name)
}

/// How long to wait for the old process to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

/// What happened to the non-fatal stages of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub exited_before_timeout: bool,
    pub backup: Option<PathBuf>,
    pub staged_file_removed: bool,
}

pub struct Applier {
    update_file: PathBuf,
    target: ExecutableTarget,
    wait: WaitPolicy,
    probe: Box<dyn ProcessProbe>,
    relauncher: Box<dyn Relaunch>,
}

impl Applier {
    #[must_use]
    pub fn new(
        update_file: PathBuf,
        app_executable: PathBuf,
        probe: Box<dyn ProcessProbe>,
        relauncher: Box<dyn Relaunch>,
    ) -> Self {
        Self {
            update_file,
            target: ExecutableTarget::new(app_executable),
            wait: WaitPolicy::default(),
            probe,
            relauncher,
        }
    }

    #[must_use]
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn target(&self) -> &ExecutableTarget {
        &self.target
    }

    /// Run every stage in order.
    ///
    /// With [`ReplaceImage`] this does not return on success.
    ///
    /// # Errors
    /// Returns the first fatal error; later stages are not attempted.
    pub fn run(mut self) -> Result<ApplyReport, ApplyError> {
        info!("Update file: {}", self.update_file.display());
        info!("Application: {}", self.target.current_path.display());

        if !self.target.current_path.exists() {
            return Err(ApplyError::TargetMissing {
                path: self.target.current_path.clone(),
            });
        }

        let exited_before_timeout = self.await_exit();
        let backup = self.backup();
        self.replace()?;
        self.restore_permissions()?;
        let staged_file_removed = self.cleanup();
        self.relaunch()?;

        Ok(ApplyReport {
            exited_before_timeout,
            backup,
            staged_file_removed,
        })
    }

    /// Poll until the target is no longer running. Returns `false` when the
    /// wait timed out; the caller proceeds either way.
    pub fn await_exit(&mut self) -> bool {
        let name = self.target.file_name();
        info!("[{}] Waiting for {name} to close...", ApplyStage::AwaitExit);

        for attempt in 0..self.wait.attempts {
            if !self.probe.is_running(&name) {
                info!("Application closed");
                return true;
            }
            if attempt + 1 < self.wait.attempts {
                std::thread::sleep(self.wait.interval);
            }
        }

        warn!(
            "{name} still running after {} checks, proceeding anyway",
            self.wait.attempts
        );
        false
    }

    /// Copy the current executable next to itself. Failures are logged and
    /// yield `None`.
    #[must_use]
    pub fn backup(&self) -> Option<PathBuf> {
        let target = &self.target;
        info!(
            "[{}] Creating backup: {}",
            ApplyStage::Backup,
            target.backup_path.display()
        );
        match std::fs::copy(&target.current_path, &target.backup_path) {
            Ok(_) => Some(target.backup_path.clone()),
            Err(error) => {
                warn!("Could not create backup: {error}");
                None
            }
        }
    }

    /// Install the staged file over the target.
    ///
    /// # Errors
    /// Fails with [`ApplyError::StagedFileMissing`] if the staged file is
    /// gone, for example because a previous run already consumed it.
    pub fn replace(&self) -> Result<(), ApplyError> {
        info!("[{}] Installing update...", ApplyStage::Replace);
        if !self.update_file.is_file() {
            return Err(ApplyError::StagedFileMissing {
                path: self.update_file.clone(),
            });
        }

        if is_archive(&self.update_file) {
            self.replace_from_archive()
        } else {
            self.replace_from_file()
        }
    }

    fn replace_from_file(&self) -> Result<(), ApplyError> {
        let target = &self.target.current_path;
        remove_if_present(target)?;
        std::fs::copy(&self.update_file, target).map_err(|error| {
            ApplyError::io_with_path(
                ApplyStage::Replace,
                "failed to copy update into place",
                target,
                &error,
            )
        })?;
        info!("Replaced {}", target.display());
        Ok(())
    }

    fn replace_from_archive(&self) -> Result<(), ApplyError> {
        let target = &self.target.current_path;
        let install_dir = target.parent().unwrap_or_else(|| Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix(".marwan-update-")
            .tempdir_in(install_dir)
            .map_err(|error| {
                ApplyError::io_with_path(
                    ApplyStage::Replace,
                    "failed to create extraction directory",
                    install_dir,
                    &error,
                )
            })?;

        info!("Extracting {}", self.update_file.display());
        archive::extract_zip(&self.update_file, scratch.path())?;

        let Some(file_name) = target.file_name() else {
            return Err(ApplyError::TargetMissing {
                path: target.clone(),
            });
        };
        let extracted = archive::find_entry(scratch.path(), file_name).ok_or_else(|| {
            ApplyError::ArchiveMissingExecutable {
                archive: self.update_file.clone(),
                name: file_name.to_string_lossy().into_owned(),
            }
        })?;

        remove_if_present(target)?;
        std::fs::rename(&extracted, target).map_err(|error| {
            ApplyError::io_with_path(
                ApplyStage::Replace,
                "failed to move extracted executable into place",
                target,
                &error,
            )
        })?;
        info!("Replaced {} from archive", target.display());
        Ok(())
    }

    /// Mark the installed file executable.
    ///
    /// # Errors
    /// Returns an error if the permissions cannot be changed.
    pub fn restore_permissions(&self) -> Result<(), ApplyError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            info!("[{}] Setting mode 755", ApplyStage::RestorePermissions);
            let target = &self.target.current_path;
            std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755)).map_err(
                |error| {
                    ApplyError::io_with_path(
                        ApplyStage::RestorePermissions,
                        "failed to make executable",
                        target,
                        &error,
                    )
                },
            )?;
        }
        Ok(())
    }

    /// Delete the staged file. Returns whether it was removed.
    #[must_use]
    pub fn cleanup(&self) -> bool {
        info!("[{}] Removing staged update", ApplyStage::Cleanup);
        match std::fs::remove_file(&self.update_file) {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    "Could not remove {}: {error}",
                    self.update_file.display()
                );
                false
            }
        }
    }

    /// Start the updated application.
    ///
    /// # Errors
    /// Returns an error if the relaunch strategy fails.
    pub fn relaunch(&mut self) -> Result<(), ApplyError> {
        let target = &self.target.current_path;
        info!("[{}] Starting {}", ApplyStage::Relaunch, target.display());
        self.relauncher.relaunch(target).map_err(|error| {
            ApplyError::io_with_path(
                ApplyStage::Relaunch,
                "failed to start updated application",
                target,
                &error,
            )
        })
    }
}

fn is_archive(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(ARCHIVE_SUFFIX))
}

fn remove_if_present(path: &Path) -> Result<(), ApplyError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(ApplyError::io_with_path(
            ApplyStage::Replace,
            "failed to remove old executable",
            path,
            &error,
        )),
    }
}

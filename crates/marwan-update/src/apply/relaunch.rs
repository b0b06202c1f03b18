use std::path::Path;
use std::process::Command;

use log::info;
use marwan_platform::Detach;

/// Final step of an update: start the replaced application again.
pub trait Relaunch {
    /// Start `executable`. Strategies that replace the current process only
    /// return when that fails.
    ///
    /// # Errors
    /// Returns the OS error raised while starting the executable.
    fn relaunch(&mut self, executable: &Path) -> std::io::Result<()>;
}

/// Starts the application as an independent process; the caller exits
/// afterwards.
#[derive(Debug, Default)]
pub struct SpawnDetached;

impl Relaunch for SpawnDetached {
    fn relaunch(&mut self, executable: &Path) -> std::io::Result<()> {
        let child = Command::new(executable).detach().spawn()?;
        info!("Relaunched {} as pid {}", executable.display(), child.id());
        Ok(())
    }
}

/// Replaces the current process image with the application.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct ReplaceImage;

#[cfg(unix)]
impl Relaunch for ReplaceImage {
    fn relaunch(&mut self, executable: &Path) -> std::io::Result<()> {
        use std::os::unix::process::CommandExt;

        info!("Replacing applier with {}", executable.display());
        log::logger().flush();
        Err(Command::new(executable).exec())
    }
}

/// The relaunch strategy for the platform this build targets.
#[must_use]
pub fn platform_relaunch() -> Box<dyn Relaunch> {
    #[cfg(unix)]
    {
        Box::new(ReplaceImage)
    }
    #[cfg(not(unix))]
    {
        Box::new(SpawnDetached)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn spawn_detached_starts_executable() {
        let mut strategy = SpawnDetached;
        strategy
            .relaunch(Path::new("true"))
            .expect("true should be spawned");
    }

    #[test]
    fn spawn_detached_reports_missing_executable() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let mut strategy = SpawnDetached;
        let error = strategy
            .relaunch(&temp.path().join("gone"))
            .expect_err("missing executable should fail");
        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn replace_image_returns_error_when_exec_fails() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let mut strategy = ReplaceImage;
        let error = strategy
            .relaunch(&temp.path().join("gone"))
            .expect_err("exec of a missing file should fail");
        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
    }
}

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Extension trait that lets a spawned child outlive its parent.
///
/// On Unix the child is moved into its own process group so terminal
/// signals aimed at the parent do not reach it. On Windows the child gets a
/// new process group and either no console or a fresh one.
pub trait Detach {
    fn detach(&mut self) -> &mut Self;

    /// Like [`Detach::detach`], but on Windows the child is given its own
    /// visible console window so its standard output can be read.
    fn detach_with_console(&mut self) -> &mut Self;
}

impl Detach for std::process::Command {
    #[cfg(windows)]
    fn detach(&mut self) -> &mut Self {
        self.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP)
    }

    #[cfg(unix)]
    fn detach(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        self.process_group(0)
    }

    #[cfg(not(any(unix, windows)))]
    fn detach(&mut self) -> &mut Self {
        self
    }

    #[cfg(windows)]
    fn detach_with_console(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NEW_CONSOLE | CREATE_NEW_PROCESS_GROUP)
    }

    #[cfg(not(windows))]
    fn detach_with_console(&mut self) -> &mut Self {
        self.detach()
    }
}

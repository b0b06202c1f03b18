use std::ffi::OsStr;
use std::path::Path;

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System, UpdateKind};

/// Answers whether a process with a given executable name is alive.
pub trait ProcessProbe {
    fn is_running(&mut self, executable_name: &str) -> bool;
}

/// Probe backed by the operating system's process table.
pub struct SystemProbe {
    own_pid: Option<Pid>,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            own_pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_name(candidate: &OsStr, wanted: &str) -> bool {
    candidate.to_string_lossy().eq_ignore_ascii_case(wanted)
}

impl ProcessProbe for SystemProbe {
    fn is_running(&mut self, executable_name: &str) -> bool {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_processes(ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet)),
        );

        system.processes().iter().any(|(pid, process)| {
            // Linux lists every thread as its own task; only whole processes count.
            if Some(*pid) == self.own_pid || process.thread_kind().is_some() {
                return false;
            }
            // Linux truncates `name()` to 15 bytes; the executable path is exact.
            matches_name(process.name(), executable_name)
                || process
                    .exe()
                    .and_then(Path::file_name)
                    .is_some_and(|name| matches_name(name, executable_name))
        })
    }
}

//! Platform glue shared by the host application and the applier process:
//! per-user directories, process spawning adapters, and log setup.

mod commands;
pub mod logging;
mod paths;

pub use commands::Detach;
pub use paths::{AppPaths, AppPathsError, executable_name};

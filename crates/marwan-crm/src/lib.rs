//! Host side of Marwan Management CRM: settings, startup lifecycle, and the
//! background update controller behind the `marwan-crm` command line.

pub mod app;
pub mod cli;
pub mod error;
pub mod lifecycle;
pub mod settings;
pub mod single_instance;
pub mod update_controller;

#[cfg(test)]
mod test_support;

pub use app::{APP_VERSION, App};
pub use cli::{Cli, Command, ConfigCommand};
pub use error::{AppError, AppErrorDetail};
pub use settings::{AppSettings, SettingsError};
pub use single_instance::{AcquireError, SingleInstance};
pub use update_controller::{UpdateConfig, UpdateController, UpdateEvent, UpdateState};

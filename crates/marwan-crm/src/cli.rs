use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "marwan-crm", version, about = "Marwan Management CRM")]
pub struct Cli {
    /// Log debug output regardless of the `debug_logging` setting.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The command to run; `run` when none was given.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the application.
    Run,
    /// Check whether a newer release is published.
    Check,
    /// Download the latest release and hand it to the installer.
    Update {
        /// Open the release page in a browser when there is no download for
        /// this platform.
        #[arg(long)]
        open_release: bool,
    },
    /// Print the running version.
    Version,
    /// Inspect or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

impl Command {
    /// Commands that may replace the executable must not run beside another
    /// instance.
    #[must_use]
    pub fn needs_instance_lock(&self) -> bool {
        matches!(self, Self::Run | Self::Update { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConfigCommand {
    /// Print every setting as JSON.
    Show,
    /// Print one setting, e.g. `shortcuts.desktop`.
    Get { key: String },
    /// Change one setting. Values are read as JSON, falling back to a plain
    /// string.
    Set { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorDetail {
    Message(String),
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl std::fmt::Display for AppErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(f, "{message}"),
            Self::Io { kind, message } => write!(f, "{kind}: {message}"),
        }
    }
}

impl From<String> for AppErrorDetail {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for AppErrorDetail {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<std::io::Error> for AppErrorDetail {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<marwan_update::CheckFailure> for AppErrorDetail {
    fn from(value: marwan_update::CheckFailure) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<marwan_update::DownloadError> for AppErrorDetail {
    fn from(value: marwan_update::DownloadError) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<marwan_update::HandoffError> for AppErrorDetail {
    fn from(value: marwan_update::HandoffError) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<crate::settings::SettingsError> for AppErrorDetail {
    fn from(value: crate::settings::SettingsError) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<marwan_platform::AppPathsError> for AppErrorDetail {
    fn from(value: marwan_platform::AppPathsError) -> Self {
        Self::Message(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Message(String),
    UpdateCheckFailed {
        details: AppErrorDetail,
    },
    NoAssetFound {
        version: String,
        release_url: Option<String>,
    },
    DownloadFailed {
        details: AppErrorDetail,
    },
    HandoffFailed {
        details: AppErrorDetail,
    },
    UpdateInProgress,
    NoUpdateAvailable,
    NothingToInstall,
    Settings {
        action: &'static str,
        details: AppErrorDetail,
    },
    Startup {
        phase: &'static str,
        details: AppErrorDetail,
    },
}

impl AppError {
    pub fn update_check_failed(details: impl Into<AppErrorDetail>) -> Self {
        Self::UpdateCheckFailed {
            details: details.into(),
        }
    }

    pub fn no_asset_found(version: impl Into<String>, release_url: Option<&str>) -> Self {
        Self::NoAssetFound {
            version: version.into(),
            release_url: release_url.map(str::to_string),
        }
    }

    pub fn download_failed(details: impl Into<AppErrorDetail>) -> Self {
        Self::DownloadFailed {
            details: details.into(),
        }
    }

    pub fn handoff_failed(details: impl Into<AppErrorDetail>) -> Self {
        Self::HandoffFailed {
            details: details.into(),
        }
    }

    pub fn settings(action: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::Settings {
            action,
            details: details.into(),
        }
    }

    pub fn startup(phase: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::Startup {
            phase,
            details: details.into(),
        }
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for AppError {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Message(format!("failed to write output: {error}"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(f, "{message}"),
            Self::UpdateCheckFailed { details } => write!(f, "Update check failed: {details}"),
            Self::NoAssetFound {
                version,
                release_url: Some(url),
            } => write!(
                f,
                "Version {version} has no download for this platform. Download it manually from {url}"
            ),
            Self::NoAssetFound {
                version,
                release_url: None,
            } => write!(
                f,
                "Version {version} has no download for this platform. Download it manually from the releases page"
            ),
            Self::DownloadFailed { details } => write!(f, "Update download failed: {details}"),
            Self::HandoffFailed { details } => {
                write!(f, "Could not start the update installer: {details}")
            }
            Self::UpdateInProgress => write!(f, "An update operation is already in progress"),
            Self::NoUpdateAvailable => write!(f, "No update is available; run a check first"),
            Self::NothingToInstall => write!(f, "No downloaded update is ready to install"),
            Self::Settings { action, details } => write!(f, "Settings {action} failed: {details}"),
            Self::Startup { phase, details } => write!(f, "Startup {phase} failed: {details}"),
        }
    }
}

impl std::error::Error for AppError {}

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Bumped when the first-run setup needs to be shown again.
pub const CONFIG_VERSION: &str = "1.0";

const DATABASE_FILE: &str = "restaurant_crm.db";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unknown setting '{key}'")]
    UnknownKey { key: String },
    #[error("invalid value for '{key}': {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub setup_complete: bool,

    #[serde(default = "default_config_version")]
    pub config_version: String,

    #[serde(default = "default_installation_dir")]
    pub installation_dir: PathBuf,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub shortcuts: ShortcutSettings,

    #[serde(default)]
    pub restaurant_name: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default = "default_update_repository")]
    pub update_repository: String,

    #[serde(default = "default_true")]
    pub check_updates_on_startup: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_download_connect_timeout")]
    pub download_connect_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default)]
    pub last_update_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutSettings {
    #[serde(default = "default_true")]
    pub desktop: bool,

    #[serde(default = "default_true")]
    pub start_menu: bool,

    #[serde(default)]
    pub startup: bool,
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self {
            desktop: true,
            start_menu: true,
            startup: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_config_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_installation_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_database_path() -> PathBuf {
    default_installation_dir().join(DATABASE_FILE)
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_date_format() -> String {
    "MM/DD/YYYY".to_string()
}

fn default_update_repository() -> String {
    "cowebsLB/marwan-managment-CRM-FnB".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_download_connect_timeout() -> u64 {
    marwan_update::DOWNLOAD_CONNECT_TIMEOUT.as_secs()
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            setup_complete: false,
            config_version: default_config_version(),
            installation_dir: default_installation_dir(),
            database_path: default_database_path(),
            shortcuts: ShortcutSettings::default(),
            restaurant_name: String::new(),
            currency: default_currency(),
            date_format: default_date_format(),
            update_repository: default_update_repository(),
            check_updates_on_startup: true,
            http_timeout_secs: default_http_timeout(),
            download_connect_timeout_secs: default_download_connect_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            last_update_check: None,
        }
    }
}

impl AppSettings {
    /// Read settings from `path`. A missing or unreadable file yields the
    /// defaults; keys absent from the file keep their default values.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Error parsing settings file {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Error reading settings file {}: {error}", path.display());
                Self::default()
            }
        }
    }

    /// Write settings to `path`, creating its directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| SettingsError::io("failed to create settings directory", error))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|error| SettingsError::io("failed to write settings file", error))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    #[must_use]
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// The first-run setup must run again when the stored settings were
    /// written for a different configuration version.
    #[must_use]
    pub fn should_rerun_setup(&self) -> bool {
        self.config_version != CONFIG_VERSION
    }

    pub fn record_update_check(&mut self, at: DateTime<Utc>) {
        self.last_update_check = Some(at);
    }

    /// Look up a setting by dotted key, e.g. `shortcuts.desktop`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(&root, |current, part| current.get(part))
            .cloned()
    }

    /// Set a setting by dotted key. `raw` is read as JSON when it parses
    /// (`true`, `15`, `{"desktop":false}`) and as a plain string otherwise.
    ///
    /// # Errors
    /// Returns an error for unknown keys or values of the wrong type; the
    /// settings are left unchanged in that case.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let mut root = serde_json::to_value(&*self)?;

        let slot = key
            .split('.')
            .try_fold(&mut root, |current, part| current.get_mut(part))
            .ok_or_else(|| SettingsError::UnknownKey {
                key: key.to_string(),
            })?;

        let parsed = serde_json::from_str(raw).ok();
        *slot = match (slot.is_string(), parsed) {
            (true, Some(Value::String(text))) => Value::String(text),
            (true, _) | (false, None) => Value::String(raw.to_string()),
            (false, Some(value)) => value,
        };

        *self = serde_json::from_value(root).map_err(|source| SettingsError::InvalidValue {
            key: key.to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_first_run_values() {
        let settings = AppSettings::default();

        assert!(!settings.setup_complete);
        assert_eq!(settings.config_version, "1.0");
        assert!(settings.database_path.ends_with(DATABASE_FILE));
        assert_eq!(settings.shortcuts, ShortcutSettings::default());
        assert!(settings.shortcuts.desktop);
        assert!(!settings.shortcuts.startup);
        assert_eq!(settings.currency, "USD");
        assert_eq!(settings.date_format, "MM/DD/YYYY");
        assert_eq!(
            settings.update_repository,
            "cowebsLB/marwan-managment-CRM-FnB"
        );
        assert!(settings.check_updates_on_startup);
        assert_eq!(settings.http_timeout_secs, 10);
        assert_eq!(settings.download_connect_timeout_secs, 30);
        assert_eq!(settings.max_log_size_bytes, 5 * 1024 * 1024);
        assert!(settings.last_update_check.is_none());
    }

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let value = json!({
            "setup_complete": true,
            "restaurant_name": "Marwan Grill",
            "shortcuts": { "desktop": false }
        });

        let settings: AppSettings =
            serde_json::from_value(value).expect("settings JSON should deserialize");

        assert!(settings.setup_complete);
        assert_eq!(settings.restaurant_name, "Marwan Grill");
        assert!(!settings.shortcuts.desktop);
        assert!(settings.shortcuts.start_menu);
        assert_eq!(settings.currency, "USD");
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ not json").expect("settings file should be written");

        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
    }

    #[test]
    fn save_and_load_preserve_values() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("config").join("settings.json");
        let mut settings = AppSettings::default();
        settings.restaurant_name = "Cedar House".to_string();
        settings.record_update_check(Utc::now());

        settings.save_to(&path).expect("settings should save");

        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn dotted_get_reads_nested_values() {
        let settings = AppSettings::default();

        assert_eq!(settings.get("shortcuts.start_menu"), Some(json!(true)));
        assert_eq!(settings.get("currency"), Some(json!("USD")));
        assert_eq!(settings.get("shortcuts.missing"), None);
        assert_eq!(settings.get("nope"), None);
    }

    #[test]
    fn dotted_set_parses_json_and_plain_strings() {
        let mut settings = AppSettings::default();

        settings
            .set("shortcuts.startup", "true")
            .expect("bool should be accepted");
        settings
            .set("restaurant_name", "Marwan Grill")
            .expect("plain string should be accepted");
        settings
            .set("http_timeout_secs", "15")
            .expect("number should be accepted");
        settings
            .set("currency", "961")
            .expect("numeric text should stay a string");

        assert!(settings.shortcuts.startup);
        assert_eq!(settings.restaurant_name, "Marwan Grill");
        assert_eq!(settings.currency, "961");
        assert_eq!(settings.http_timeout_secs, 15);
    }

    #[test]
    fn set_rejects_unknown_keys_and_wrong_types() {
        let mut settings = AppSettings::default();

        assert!(matches!(
            settings.set("shortcuts.taskbar", "true"),
            Err(SettingsError::UnknownKey { .. })
        ));
        assert!(matches!(
            settings.set("http_timeout_secs", "soon"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn version_mismatch_requires_setup_rerun() {
        let mut settings = AppSettings::default();
        assert!(!settings.should_rerun_setup());

        settings.config_version = "0.9".to_string();
        assert!(settings.should_rerun_setup());
    }
}

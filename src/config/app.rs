use std::fs::{read_to_string, write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigResult;

/// Name of the application settings file.
pub const APP_CONFIG_NAME: &str = "wallrotate.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingSettings {
    /// Terminal log level ("error", "warn", "info", "debug", "trace").
    pub level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageSettings {
    /// JSON file backing the preferences store (API keys, saved queries).
    pub preferences_file: String,
}

/// Static desktop dimensions used for the resolution hint when nothing better is known.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DisplaySettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl DisplaySettings {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RotationSettings {
    /// Whether fetched images are passed through the enricher.
    pub enrich: bool,
    /// Page fetched when none is given on the command line.
    pub page: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub http: HttpSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    pub rotation: RotationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpSettings {
                user_agent: format!("wallrotate/{}", env!("CARGO_PKG_VERSION")),
                timeout_secs: 30,
                connect_timeout_secs: 10,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                log_to_file: true,
                log_file: "wallrotate.log".to_string(),
            },
            storage: StorageSettings {
                preferences_file: "preferences.json".to_string(),
            },
            display: DisplaySettings::default(),
            rotation: RotationSettings {
                enrich: true,
                page: 1,
            },
        }
    }
}

impl AppConfig {
    /// Loads the settings file, writing the defaults first if it doesn't exist.
    pub fn load_or_create(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            trace!("{}: does not exist, creating defaults...", path.display());
            let config = AppConfig::default();
            write(path, toml::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let config: AppConfig = toml::from_str(&read_to_string(path)?)?;
        Ok(config)
    }

    /// Parses the configured terminal log level, falling back to `Info`.
    pub fn log_level(&self) -> log::LevelFilter {
        self.logging
            .level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

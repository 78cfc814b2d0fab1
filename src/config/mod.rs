//! Configuration for wallrotate
//!
//! Two layers live here:
//! 1. [`ConfigStore`], the opaque key-value preferences blob the query store persists into
//! 2. [`AppConfig`], the TOML application settings (HTTP, logging, storage, display)

use std::time::Duration;

use thiserror::Error;

pub mod app;
pub mod store;

pub use app::{AppConfig, DisplaySettings, HttpSettings, LoggingSettings, RotationSettings, StorageSettings};
pub use store::{ConfigStore, JsonFileConfigStore, MemoryConfigStore};

// Define error types for config handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store rejected write: {0}")]
    Rejected(String),
}

// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Preference key holding the serialized query collection of a provider.
pub fn queries_key(provider: &str) -> String {
    format!("{provider}_queries")
}

/// Preference key holding the API key of a provider.
pub fn api_key_key(provider: &str) -> String {
    format!("{provider}_api_key")
}

/// Preference key holding the account name of a provider.
pub fn username_key(provider: &str) -> String {
    format!("{provider}_username")
}

/// Builds the shared HTTP client from the `[http]` settings.
///
/// The client is owned by the caller and handed to the transport, so pooling and
/// timeouts are configured exactly once.
pub fn build_http_client(settings: &HttpSettings) -> ConfigResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .build()?;
    Ok(client)
}

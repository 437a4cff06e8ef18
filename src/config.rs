//! Runtime configuration parsed from environment variables.

use std::time::Duration;

use crate::favorites::DEFAULT_STORAGE_KEY;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_STORAGE_PATH: &str = "favorites-store.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Bounds for every remote favorites call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl RemoteTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for RemoteTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoritesConfig {
    pub api_base_url: String,
    pub storage_path: String,
    pub storage_key: String,
    pub timeouts: RemoteTimeouts,
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            storage_path: DEFAULT_STORAGE_PATH.to_owned(),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            timeouts: RemoteTimeouts::default(),
        }
    }
}

impl FavoritesConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `FAVORITES_API_BASE_URL`: default `http://127.0.0.1:3000/api`
    /// - `FAVORITES_STORAGE_PATH`: default `favorites-store.json`
    /// - `FAVORITES_STORAGE_KEY`: default `favorites`
    /// - `FAVORITES_REQUEST_TIMEOUT_SECS`: default 10
    /// - `FAVORITES_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// Unparseable timeouts fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when a string variable is set but blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = env_string("FAVORITES_API_BASE_URL", DEFAULT_API_BASE_URL)?
            .trim_end_matches('/')
            .to_owned();
        let storage_path = env_string("FAVORITES_STORAGE_PATH", DEFAULT_STORAGE_PATH)?;
        let storage_key = env_string("FAVORITES_STORAGE_KEY", DEFAULT_STORAGE_KEY)?;
        let timeouts = RemoteTimeouts {
            request_secs: env_parse("FAVORITES_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("FAVORITES_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Ok(Self { api_base_url, storage_path, storage_key, timeouts })
    }
}

fn env_string(var: &'static str, default: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if v.trim().is_empty() => Err(ConfigError::Empty { var }),
        Ok(v) => Ok(v.trim().to_owned()),
        Err(_) => Ok(default.to_owned()),
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

/*
    moodtune | Mood-driven song recommendations for voice assistants.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const ENV_BIND: &str = "MOODTUNE_BIND";
pub const ENV_SONG_STORE: &str = "MOODTUNE_SONG_STORE";
pub const ENV_OUTBOUND_TIMEOUT: &str = "MOODTUNE_OUTBOUND_TIMEOUT_SECS";
pub const ENV_SESSION_IDLE: &str = "MOODTUNE_SESSION_IDLE_SECS";
pub const ENV_INSECURE_COOKIES: &str = "MOODTUNE_INSECURE_COOKIES";

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("No song store configured, set MOODTUNE_SONG_STORE or pass --store")]
    MissingSongStore,
}

/// Server settings. Provider credentials are read separately through rspotify's
/// `RSPOTIFY_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: String,
    /// JSON export path or Firebase Realtime Database URL.
    pub song_store: Option<String>,
    pub outbound_timeout: Duration,
    /// Conversations quiet for this long lose their session.
    pub session_idle_timeout: Duration,
    pub secure_cookies: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            song_store: None,
            outbound_timeout: Duration::from_secs(DEFAULT_OUTBOUND_TIMEOUT_SECS),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
            secure_cookies: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = bind;
        }
        config.song_store = lookup(ENV_SONG_STORE).filter(|s| !s.trim().is_empty());

        if let Some(value) = lookup(ENV_OUTBOUND_TIMEOUT) {
            config.outbound_timeout = parse_secs(ENV_OUTBOUND_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_SESSION_IDLE) {
            config.session_idle_timeout = parse_secs(ENV_SESSION_IDLE, &value)?;
        }

        if let Some(value) = lookup(ENV_INSECURE_COOKIES) {
            config.secure_cookies = !parse_flag(ENV_INSECURE_COOKIES, &value)?;
        }

        Ok(config)
    }

    pub fn song_store(&self) -> Result<&str, ConfigError> {
        self.song_store
            .as_deref()
            .ok_or(ConfigError::MissingSongStore)
    }
}

/// Whole, non-zero seconds.
fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.outbound_timeout, Duration::from_secs(10));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.song_store(), Err(ConfigError::MissingSongStore));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_BIND, "0.0.0.0:8080"),
            (ENV_SONG_STORE, "songs.json"),
            (ENV_OUTBOUND_TIMEOUT, "3"),
            (ENV_SESSION_IDLE, "600"),
            (ENV_INSECURE_COOKIES, "true"),
        ])
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.song_store(), Ok("songs.json"));
        assert_eq!(config.outbound_timeout, Duration::from_secs(3));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(600));
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[(ENV_OUTBOUND_TIMEOUT, "0")]),
            Err(ConfigError::InvalidValue { key: ENV_OUTBOUND_TIMEOUT, .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_SESSION_IDLE, "soon")]),
            Err(ConfigError::InvalidValue { key: ENV_SESSION_IDLE, .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_INSECURE_COOKIES, "maybe")]),
            Err(ConfigError::InvalidValue { key: ENV_INSECURE_COOKIES, .. })
        ));
    }
}

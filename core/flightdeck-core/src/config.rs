//! Configuration and on-disk layout for flightdeck.
//!
//! All shared state lives under `~/.flightdeck/`. Tunables are read from
//! `~/.flightdeck/config.toml`; missing fields fall back to defaults.

use std::path::PathBuf;

use fs_err as fs;
use serde::Deserialize;

/// Retention tunables for the archive directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Archived entries older than this many days are pruned.
    pub max_age_days: i64,
    /// Hard cap on the number of archive entries kept after dedup and age cutoff.
    pub max_entries: usize,
    /// Number of recent projects exposed to consumers.
    pub recent_limit: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_entries: 50,
            recent_limit: 10,
        }
    }
}

/// Main configuration struct for flightdeck.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retention: RetentionConfig,
}

impl Config {
    /// Load configuration from `~/.flightdeck/config.toml`.
    ///
    /// Missing file, unreadable file, and invalid TOML all resolve to the
    /// default configuration; a config problem must never take down a hook.
    pub fn load() -> Config {
        let config_path = base_dir().join("config.toml");
        if !config_path.exists() {
            return Config::default();
        }

        match fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %config_path.display(), error = %e, "Invalid config, using defaults");
                Config::default()
            }),
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "Unreadable config, using defaults");
                Config::default()
            }
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// Returns the flightdeck base directory.
///
/// `FLIGHTDECK_DIR` overrides the default `~/.flightdeck` (test isolation).
pub fn base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLIGHTDECK_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flightdeck")
}

/// Returns the active session store directory, creating it if needed.
pub fn sessions_dir() -> PathBuf {
    ensured(base_dir().join("sessions"))
}

/// Returns the archive directory, creating it if needed.
pub fn archive_dir() -> PathBuf {
    ensured(base_dir().join("archive"))
}

/// Returns the log directory, creating it if needed.
pub fn logs_dir() -> PathBuf {
    ensured(base_dir().join("logs"))
}

/// Path of the observer-published aggregate snapshot.
pub fn snapshot_path() -> PathBuf {
    base_dir().join("snapshot.json")
}

fn ensured(dir: PathBuf) -> PathBuf {
    if !dir.exists() {
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "Could not create directory");
        }
    }
    dir
}

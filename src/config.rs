// src/config.rs

//! Runtime configuration for the platform core.
//!
//! The configuration is read once, from the JSON file named by the
//! `EPL_CONFIG` environment variable. Every section and field has a default, so
//! a partial file (or no file at all) is fine.

use crate::driver::MessageLevel;
use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "EPL_CONFIG";

/// Global configuration, loaded on first use.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::from_env() {
    Ok(config) => config,
    Err(e) => {
        warn!("Failed to load {}: {:#}. Using defaults.", CONFIG_ENV_VAR, e);
        Config::default()
    }
});

// --- Top-Level Configuration Structure ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Error and debug message reporting.
    pub debug: DebugConfig,
    /// Display bookkeeping behaviour.
    pub display: DisplayConfig,
}

impl Config {
    /// Loads the file named by `EPL_CONFIG`, or returns the defaults if the
    /// variable is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded platform config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid platform configuration")
    }
}

// --- Debug Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Mirror every error reported to the application into the log.
    pub log_errors: bool,
    /// Least severe debug message forwarded to the loader's callback.
    /// Errors reported through `set_error` are always forwarded.
    pub max_message_level: MessageLevel,
}

impl Default for DebugConfig {
    fn default() -> Self {
        DebugConfig {
            log_errors: true,
            max_message_level: MessageLevel::Warn,
        }
    }
}

// --- Display Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Simulate `EGL_KHR_display_reference` even when the driver supports it.
    pub simulate_display_reference: bool,
    /// Honour `EGL_TRACK_REFERENCES_KHR` in display attribute lists. When
    /// false every display behaves as if it was created without it.
    pub allow_track_references: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            simulate_display_reference: false,
            allow_track_references: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_default_every_field_for_an_empty_document() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.debug.log_errors);
        assert!(config.display.allow_track_references);
    }

    #[test]
    fn it_should_keep_defaults_missing_from_a_partial_section() {
        let config =
            Config::from_json(r#"{ "display": { "simulate_display_reference": true } }"#).unwrap();
        assert!(config.display.simulate_display_reference);
        assert!(config.display.allow_track_references);
        assert_eq!(config.debug.max_message_level, MessageLevel::Warn);
    }

    #[test]
    fn it_should_read_lowercase_message_levels() {
        let config = Config::from_json(r#"{ "debug": { "max_message_level": "info" } }"#).unwrap();
        assert_eq!(config.debug.max_message_level, MessageLevel::Info);
    }

    #[test]
    fn it_should_reject_malformed_json() {
        assert!(Config::from_json("{ not json").is_err());
    }

    #[test]
    fn it_should_name_the_path_of_a_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/epl.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/epl.json"));
    }
}

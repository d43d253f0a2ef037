// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_MAX_CASCADE_ROUNDS, DEFAULT_STRICT_VERSION,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the workflow engine.
///
/// Every section is optional; missing sections and fields fall back to the
/// built-in defaults in [`consts`](crate::config::consts). It is typically
/// loaded from a YAML or TOML file and attached with
/// [`Workflow::with_config`](crate::engine::Workflow::with_config).
///
/// # Fields
/// * `dispatch` - Scheduler limits
/// * `snapshot` - Snapshot/resume behavior
/// * `failure_policy` - What to do with a handler failure nobody observes
///
/// # Example
/// ```yaml
/// dispatch:
///   max_cascade_rounds: 5000
/// snapshot:
///   strict_version: false
///   drain_timeout_ms: 10000
/// failure_policy: log
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub dispatch: DispatchOptions,
    #[serde(default)]
    pub snapshot: SnapshotOptions,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Scheduler limits.
///
/// # Fields
/// * `max_cascade_rounds` - Maximum number of consecutive match rounds one
///   dispatch may run before it is stopped and logged (optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchOptions {
    pub max_cascade_rounds: Option<usize>,
}

impl DispatchOptions {
    /// Get the cascade limit, using the built-in default if not configured.
    pub fn get_max_cascade_rounds(&self) -> usize {
        self.max_cascade_rounds.unwrap_or(DEFAULT_MAX_CASCADE_ROUNDS)
    }
}

/// Snapshot/resume behavior.
///
/// # Fields
/// * `strict_version` - Fail `resume` when the snapshot was taken from a
///   different workflow definition (optional, defaults to `true`)
/// * `drain_timeout_ms` - How long `snapshot` waits for in-flight deferred
///   handlers to settle (optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotOptions {
    pub strict_version: Option<bool>,
    pub drain_timeout_ms: Option<u64>,
}

impl SnapshotOptions {
    pub fn get_strict_version(&self) -> bool {
        self.strict_version.unwrap_or(DEFAULT_STRICT_VERSION)
    }

    pub fn get_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms.unwrap_or(DEFAULT_DRAIN_TIMEOUT_MS))
    }
}

/// Policy for a handler failure that cancels the root with nobody listening.
///
/// # Variants
/// * `Log` - Log at error level and record the failure on the context
/// * `Panic` - Log, then panic on the dispatching thread
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Log,
    Panic,
}

impl EngineConfig {
    /// Parse a config from a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a config from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => EngineConfig::from_yaml_str(&content),
        Some("toml") => EngineConfig::from_toml_str(&content),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load and validate a config file.
///
/// This function loads the configuration and rejects limits that would stop
/// the engine from making progress.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg)?;
    Ok(cfg)
}

//! TOML-based configuration for the autotap CLI.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Linux:    `~/.config/autotap/config.toml` (honouring `XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/autotap/config.toml`
//! - Windows:  `%APPDATA%\autotap\config.toml`
//!
//! Every field has a serde default, so a missing file (or a file written
//! by an older build) still produces a usable config.  Values merge in
//! three layers, later layers winning: built-in defaults, the config file,
//! CLI/environment overrides ([`ConfigOverrides`]).
//!
//! The tap area is the one section that may legitimately stay unset: when
//! no coordinates are configured, [`AppConfig::action_config`] fills the
//! bounds from the device's reported screen size.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use autotap_core::{ActionConfig, ConfigError, ScreenSize};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub clicks: ClickSettings,
    #[serde(default)]
    pub rest: RestSettings,
}

/// General agent behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSettings {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which device to drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSettings {
    /// adb serial, passed as `adb -s <serial>`.  Absent means "whatever
    /// single device adb sees".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

/// Click timing and tap area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClickSettings {
    /// Delay between actions, milliseconds.  `delay_max_ms = 0` means no
    /// wait between actions.
    #[serde(default = "default_delay_min")]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max")]
    pub delay_max_ms: u64,

    /// Tap area bounds in device pixels.  Any bound left unset defaults
    /// to the device screen edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_max: Option<u32>,
}

/// Periodic rest behaviour.  `interval_max_ms = 0` disables rests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestSettings {
    #[serde(default = "default_rest_interval_min")]
    pub interval_min_ms: u64,
    #[serde(default = "default_rest_interval_max")]
    pub interval_max_ms: u64,
    #[serde(default = "default_rest_duration_min")]
    pub duration_min_ms: u64,
    #[serde(default = "default_rest_duration_max")]
    pub duration_max_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_delay_min() -> u64 {
    500
}
fn default_delay_max() -> u64 {
    2000
}
fn default_rest_interval_min() -> u64 {
    240_000
}
fn default_rest_interval_max() -> u64 {
    420_000
}
fn default_rest_duration_min() -> u64 {
    30_000
}
fn default_rest_duration_max() -> u64 {
    90_000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            delay_min_ms: default_delay_min(),
            delay_max_ms: default_delay_max(),
            x_min: None,
            x_max: None,
            y_min: None,
            y_max: None,
        }
    }
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            interval_min_ms: default_rest_interval_min(),
            interval_max_ms: default_rest_interval_max(),
            duration_min_ms: default_rest_duration_min(),
            duration_max_ms: default_rest_duration_max(),
        }
    }
}

// ── Overrides ─────────────────────────────────────────────────────────────────

/// CLI/environment values layered over the file config.  `None` fields
/// leave the file value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub serial: Option<String>,
    pub delay_min_ms: Option<u64>,
    pub delay_max_ms: Option<u64>,
    pub x_min: Option<u32>,
    pub x_max: Option<u32>,
    pub y_min: Option<u32>,
    pub y_max: Option<u32>,
    pub rest_interval_min_ms: Option<u64>,
    pub rest_interval_max_ms: Option<u64>,
    pub rest_duration_min_ms: Option<u64>,
    pub rest_duration_max_ms: Option<u64>,
}

impl AppConfig {
    /// Applies CLI overrides on top of the file values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if overrides.serial.is_some() {
            self.device.serial = overrides.serial.clone();
        }
        if let Some(v) = overrides.delay_min_ms {
            self.clicks.delay_min_ms = v;
        }
        if let Some(v) = overrides.delay_max_ms {
            self.clicks.delay_max_ms = v;
        }
        if overrides.x_min.is_some() {
            self.clicks.x_min = overrides.x_min;
        }
        if overrides.x_max.is_some() {
            self.clicks.x_max = overrides.x_max;
        }
        if overrides.y_min.is_some() {
            self.clicks.y_min = overrides.y_min;
        }
        if overrides.y_max.is_some() {
            self.clicks.y_max = overrides.y_max;
        }
        if let Some(v) = overrides.rest_interval_min_ms {
            self.rest.interval_min_ms = v;
        }
        if let Some(v) = overrides.rest_interval_max_ms {
            self.rest.interval_max_ms = v;
        }
        if let Some(v) = overrides.rest_duration_min_ms {
            self.rest.duration_min_ms = v;
        }
        if let Some(v) = overrides.rest_duration_max_ms {
            self.rest.duration_max_ms = v;
        }
    }

    /// Whether any tap-area bound still needs the device screen size.
    pub fn needs_screen_size(&self) -> bool {
        self.clicks.x_min.is_none()
            || self.clicks.x_max.is_none()
            || self.clicks.y_min.is_none()
            || self.clicks.y_max.is_none()
    }

    /// Builds the validated [`ActionConfig`] for the run.
    ///
    /// Unset tap-area bounds fall back to the device screen edges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingArea`] when bounds are unset and no screen
    /// size is available; [`ConfigError::InvertedRange`] from validation.
    pub fn action_config(&self, screen: Option<ScreenSize>) -> Result<ActionConfig, ConfigError> {
        let area = |bound: Option<u32>, fallback: Option<u32>| -> Result<u32, ConfigError> {
            bound.or(fallback).ok_or(ConfigError::MissingArea)
        };
        let (right, bottom) = match screen {
            Some(size) => (
                Some(size.width.saturating_sub(1)),
                Some(size.height.saturating_sub(1)),
            ),
            None => (None, None),
        };

        let config = ActionConfig {
            click_delay_min: self.clicks.delay_min_ms,
            click_delay_max: self.clicks.delay_max_ms,
            x_min: area(self.clicks.x_min, Some(0))?,
            x_max: area(self.clicks.x_max, right)?,
            y_min: area(self.clicks.y_min, Some(0))?,
            y_max: area(self.clicks.y_max, bottom)?,
            rest_interval_min: self.rest.interval_min_ms,
            rest_interval_max: self.rest.interval_max_ms,
            rest_duration_min: self.rest.duration_min_ms,
            rest_duration_max: self.rest.duration_max_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Config file access ────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigFileError::NoPlatformConfigDir`] when the platform
/// config base directory cannot be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigFileError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigFileError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or from the default location when `path`
/// is `None`.  A missing file yields `AppConfig::default()`, but only for
/// the default location; an explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigFileError> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(toml::from_str(&content)?)
        }
        None => {
            let path = config_file_path()?;
            match std::fs::read_to_string(&path) {
                Ok(content) => Ok(toml::from_str(&content)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
                Err(source) => Err(ConfigFileError::Io { path, source }),
            }
        }
    }
}

/// Persists `config` to the default location, creating directories as
/// needed.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigFileError> {
    let path = config_file_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigFileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigFileError::Io {
        path: path.clone(),
        source,
    })
}

/// Resolves the platform config directory for autotap.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("autotap"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("autotap"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("autotap")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Configuration management for the cartobridge host.
//!
//! The configuration can be loaded from a YAML file, or through the `config`
//! crate so that `CARTOBRIDGE__*` environment variables override file values.
//! Every section has defaults, so an empty document is a valid configuration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Plugins shipped with the bridge, in their default dispatch order.
pub const BUILTIN_PLUGINS: &[&str] = &["heaven_map", "map_route"];

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use cartobridge_core::config::AppConfig;
///
/// let config = AppConfig::from_file("cartobridge.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Map view defaults
    #[serde(default)]
    pub map: MapConfig,

    /// Turn-by-turn navigation request parameters
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Plugin selection
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering
    /// `CARTOBRIDGE__SECTION__KEY` environment variables over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("CARTOBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Serializes the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.logging.parse_level()?;
        self.map.validate()?;
        self.navigation.validate()?;
        self.plugins.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Optional log file path; logs go to stderr otherwise
    pub file: Option<PathBuf>,

    /// Whether to include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Whether to include file/line info
    #[serde(default)]
    pub file_line: bool,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            file: None,
            timestamps: true,
            file_line: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }

    /// Builds an `EnvFilter`-style directive string, e.g. `info,cartobridge_map=debug`.
    pub fn filter_directives(&self) -> String {
        let mut modules: Vec<_> = self.module_levels.iter().collect();
        modules.sort();
        let mut directives = vec![self.level.clone()];
        directives.extend(modules.into_iter().map(|(m, l)| format!("{}={}", m, l)));
        directives.join(",")
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

/// Defaults applied to every map view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Style URL loaded when the creation parameters name none
    #[serde(default = "default_style")]
    pub default_style: String,

    /// Device pixel ratio applied to pixel-valued camera arguments
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,

    /// Duration of `camera#animate` when the call gives none
    #[serde(default = "default_animation_duration_ms")]
    pub animation_duration_ms: u64,

    /// Viewport width in logical pixels (headless backend)
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f64,

    /// Viewport height in logical pixels (headless backend)
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
}

fn default_style() -> String {
    "mapbox://styles/mapbox/streets-v11".to_string()
}

fn default_pixel_ratio() -> f64 {
    1.0
}

fn default_animation_duration_ms() -> u64 {
    300
}

fn default_viewport_width() -> f64 {
    1080.0
}

fn default_viewport_height() -> f64 {
    1920.0
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_style: default_style(),
            pixel_ratio: default_pixel_ratio(),
            animation_duration_ms: default_animation_duration_ms(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl MapConfig {
    /// Validates map defaults.
    pub fn validate(&self) -> Result<()> {
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(ConfigError::invalid_value("map.pixel_ratio", "must be positive").into());
        }
        if !(self.viewport_width > 0.0 && self.viewport_height > 0.0) {
            return Err(
                ConfigError::invalid_value("map.viewport", "width and height must be positive")
                    .into(),
            );
        }
        Ok(())
    }

    /// Default animation duration.
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }
}

/// Parameters copied into every navigation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Directions service base URL
    #[serde(default = "default_nav_base_url")]
    pub base_url: String,

    /// Directions service user
    #[serde(default = "default_nav_user")]
    pub user: String,

    /// Directions service access token
    #[serde(default = "default_nav_access_token")]
    pub access_token: String,

    /// Request uuid attached to route options
    #[serde(default = "default_nav_request_uuid")]
    pub request_uuid: String,

    /// Whether the navigation session replays the route instead of GPS
    #[serde(default = "default_true")]
    pub simulate_route: bool,

    /// Camera zoom at navigation start
    #[serde(default = "default_nav_initial_zoom")]
    pub initial_zoom: f64,
}

fn default_nav_base_url() -> String {
    "https://api.hyn.space/".to_string()
}

fn default_nav_user() -> String {
    "hyperion".to_string()
}

fn default_nav_access_token() -> String {
    "pk.hyn".to_string()
}

fn default_nav_request_uuid() -> String {
    "UUID".to_string()
}

fn default_nav_initial_zoom() -> f64 {
    15.0
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            base_url: default_nav_base_url(),
            user: default_nav_user(),
            access_token: default_nav_access_token(),
            request_uuid: default_nav_request_uuid(),
            simulate_route: true,
            initial_zoom: default_nav_initial_zoom(),
        }
    }
}

impl NavigationConfig {
    /// Validates navigation parameters.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::missing_field("navigation.base_url").into());
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "navigation.base_url",
                format!("not an http(s) URL: {}", self.base_url),
            )
            .into());
        }
        Ok(())
    }
}

/// Which builtin plugins are registered for each new map view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin names in dispatch order
    #[serde(default = "default_enabled_plugins")]
    pub enabled: Vec<String>,
}

fn default_enabled_plugins() -> Vec<String> {
    BUILTIN_PLUGINS.iter().map(|s| s.to_string()).collect()
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_plugins(),
        }
    }
}

impl PluginsConfig {
    /// Rejects unknown and duplicated plugin names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for name in &self.enabled {
            if !BUILTIN_PLUGINS.contains(&name.as_str()) {
                return Err(ConfigError::UnknownPlugin { name: name.clone() }.into());
            }
            if !seen.insert(name) {
                return Err(ConfigError::validation_failed(format!(
                    "plugin '{}' enabled twice",
                    name
                ))
                .into());
            }
        }
        Ok(())
    }
}

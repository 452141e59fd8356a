//! Configuration loading and typed config structures for Firewatch.
//!
//! The optional configuration file is `firewatch-config.yaml` in the working
//! directory. This module defines strongly-typed structs that mirror the
//! YAML structure, applies `FIREWATCH_*` environment overrides, and
//! validates the result before anything is started.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {message}")]
    Env {
        /// The environment variable name.
        var: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `firewatch-config.yaml`. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FirewatchConfig {
    /// Application identity reported by the health endpoint.
    #[serde(default)]
    pub app: AppConfig,

    /// Where the camera list lives.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Per-source scheduler timing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Broadcast hub and subscriber connection timing.
    #[serde(default)]
    pub hub: HubConfig,

    /// Which detector implementation to run.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FirewatchConfig {
    /// Load configuration from a YAML file, apply environment overrides
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, and
    /// [`ConfigError::Env`] / [`ConfigError::Invalid`] for bad values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_with(&contents, |var| std::env::var(var).ok())
    }

    /// Load from `path` if it exists, otherwise start from defaults. In
    /// both cases environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, resolving overrides through
    /// `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing, an override, or validation fails.
    pub fn parse_with<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FIREWATCH_*` overrides.
    ///
    /// - `FIREWATCH_SOURCES_PATH` overrides `sources.path`
    /// - `FIREWATCH_INTERVAL_MS` overrides `scheduler.interval_ms`
    /// - `FIREWATCH_DETECTOR_TIMEOUT_MS` overrides `scheduler.detector_timeout_ms`
    /// - `FIREWATCH_HOST` / `FIREWATCH_PORT` override `server.host` / `server.port`
    /// - `FIREWATCH_DETECTOR_PROGRAM` overrides `detector.program` and
    ///   selects the process detector
    /// - `FIREWATCH_LOG_JSON` overrides `logging.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a numeric or boolean override does
    /// not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FIREWATCH_SOURCES_PATH") {
            self.sources.path = PathBuf::from(val);
        }
        if let Some(val) = lookup("FIREWATCH_INTERVAL_MS") {
            self.scheduler.interval_ms = parse_override("FIREWATCH_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("FIREWATCH_DETECTOR_TIMEOUT_MS") {
            self.scheduler.detector_timeout_ms =
                parse_override("FIREWATCH_DETECTOR_TIMEOUT_MS", &val)?;
        }
        if let Some(val) = lookup("FIREWATCH_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("FIREWATCH_PORT") {
            self.server.port = parse_override("FIREWATCH_PORT", &val)?;
        }
        if let Some(val) = lookup("FIREWATCH_DETECTOR_PROGRAM") {
            self.detector.kind = DetectorKind::Process;
            self.detector.program = Some(val);
        }
        if let Some(val) = lookup("FIREWATCH_LOG_JSON") {
            self.logging.json = parse_override("FIREWATCH_LOG_JSON", &val)?;
        }
        Ok(())
    }

    /// Reject values that would make the service misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_ms must be greater than zero".to_owned(),
            ));
        }
        if self.scheduler.detector_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.detector_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.hub.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "hub.send_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.hub.keepalive_secs == 0 {
            return Err(ConfigError::Invalid(
                "hub.keepalive_secs must be greater than zero".to_owned(),
            ));
        }
        if self.detector.kind == DetectorKind::Process
            && self.detector.program.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "detector.program is required when detector.kind is `process`".to_owned(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T>(var: &str, val: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    val.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_owned(),
        message: e.to_string(),
    })
}

/// Application identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Display name of the service.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Version reported by `GET /api/health`.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_version(),
        }
    }
}

/// Camera list location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcesConfig {
    /// Path to the JSON camera list.
    #[serde(default = "default_sources_path")]
    pub path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            path: default_sources_path(),
        }
    }
}

/// Per-source scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Sleep between the end of one tick and the start of the next.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound on a single detector call before the tick is faulted.
    #[serde(default = "default_detector_timeout_ms")]
    pub detector_timeout_ms: u64,
}

impl SchedulerConfig {
    /// The inter-tick interval.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// The detector call deadline.
    pub const fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            detector_timeout_ms: default_detector_timeout_ms(),
        }
    }
}

/// Broadcast hub and subscriber connection timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// A send that takes longer than this counts as a failed send.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Idle wait on a subscriber's inbound side before re-checking.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl HubConfig {
    /// Per-subscriber send deadline.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Inbound keepalive wait.
    pub const fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

/// Detector implementation selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Built-in placeholder that emits random fire/smoke detections.
    #[default]
    Stub,
    /// External program invoked once per tick.
    Process,
}

/// Detector settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectorConfig {
    /// Which implementation to use.
    #[serde(default)]
    pub kind: DetectorKind,

    /// Program to run for the process detector.
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments passed before `--camera_id <id>`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Seed for the stub detector. Unseeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_app_name() -> String {
    "Fire & Smoke Monitor".to_owned()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

fn default_sources_path() -> PathBuf {
    PathBuf::from("config/cameras.json")
}

const fn default_interval_ms() -> u64 {
    1_000
}

const fn default_detector_timeout_ms() -> u64 {
    5_000
}

const fn default_send_timeout_ms() -> u64 {
    5_000
}

const fn default_keepalive_secs() -> u64 {
    60
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_owned()
}

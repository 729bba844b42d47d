//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `ruleflow.toml` in the working directory (or the file named by
//! `RULEFLOW_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use ruleflow_adapter_mqtt::MqttConfig;
use ruleflow_adapter_virtual::VirtualConfig;
use ruleflow_app::engine::EngineConfig;

const DEFAULT_PATH: &str = "ruleflow.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine limits.
    pub engine: EngineSettings,
    /// Where rule files live.
    pub rules: RulesConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Which device transport to use.
    pub transport: TransportConfig,
    /// MQTT broker settings, used when `transport.kind = "mqtt"`.
    pub mqtt: MqttConfig,
    /// Simulated devices, used when `transport.kind = "virtual"`.
    #[serde(rename = "virtual")]
    pub virtual_devices: VirtualConfig,
}

/// Engine limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum lifetime of a run in seconds, `0` disables the limit.
    pub max_run_seconds: u64,
    /// Number of finished runs whose status stays queryable.
    pub run_history: usize,
    /// Capacity of the engine event bus.
    pub event_capacity: usize,
}

/// Rule file location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory scanned for `*.json` rule files.
    pub dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Transport selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Virtual,
    Mqtt,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(ConfigError::Validation(format!(
                "unknown transport {other:?}, expected \"virtual\" or \"mqtt\""
            ))),
        }
    }
}

impl Config {
    /// Load configuration from `ruleflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if an
    /// override or the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("RULEFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("RULEFLOW_RULES_DIR") {
            self.rules.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("RULEFLOW_TRANSPORT") {
            self.transport.kind = val.parse()?;
        }
        if let Ok(val) = std::env::var("RULEFLOW_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("RULEFLOW_MQTT_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.broker_port = port;
        }
        if let Ok(val) = std::env::var("RULEFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.event_capacity must be non-zero".to_string(),
            ));
        }
        if self.rules.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "rules.dir must not be empty".to_string(),
            ));
        }
        if self.transport.kind == TransportKind::Mqtt {
            if self.mqtt.broker_port == 0 {
                return Err(ConfigError::Validation(
                    "mqtt.broker_port must be non-zero".to_string(),
                ));
            }
            if self.mqtt.request_capacity == 0 {
                return Err(ConfigError::Validation(
                    "mqtt.request_capacity must be non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Engine configuration derived from `[engine]`.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_run_duration: (self.engine.max_run_seconds > 0)
                .then(|| Duration::from_secs(self.engine.max_run_seconds)),
            run_history: self.engine.run_history,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_run_seconds: 3600,
            run_history: 256,
            event_capacity: 256,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("rules"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ruleflowd=info,ruleflow=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

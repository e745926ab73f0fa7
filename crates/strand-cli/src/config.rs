//! Configuration loading from file and environment variables.

use serde::Deserialize;
use strand_core::{ObserverOptions, StageOp, StageSpec};
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Which events the root observer subscribes to.
    #[serde(default)]
    pub source: SourceConfig,

    /// Stages applied to the root observer.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root observer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Whitespace-separated event types.
    #[serde(default = "default_types")]
    pub types: String,

    /// Register the root observer for the capture phase.
    #[serde(default)]
    pub capture: bool,
}

/// Pipeline stages, resolved against the built-in callbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stages")]
    pub stages: Vec<StageSpec>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "strand_core=trace,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_types() -> String {
    "message".to_string()
}

fn default_stages() -> Vec<StageSpec> {
    vec![StageSpec::new(StageOp::ForEach, "print")]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SourceConfig {
    pub fn options(&self) -> ObserverOptions {
        ObserverOptions::default().with_capture(self.capture)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            types: default_types(),
            capture: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `STRAND_TYPES` overrides `source.types`
/// - `STRAND_CAPTURE` overrides `source.capture` (set to "true" to enable)
/// - `STRAND_LOG_LEVEL` overrides `logging.level`
/// - `STRAND_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies `STRAND_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Config {
    if let Some(types) = lookup("STRAND_TYPES") {
        config.source.types = types;
    }
    if let Some(capture) = lookup("STRAND_CAPTURE") {
        config.source.capture = is_enabled(&capture);
    }
    if let Some(level) = lookup("STRAND_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("STRAND_LOG_JSON") {
        config.logging.json = is_enabled(&json);
    }
    config
}

fn is_enabled(value: &str) -> bool {
    value == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.source.types, "message");
        assert!(!config.source.capture);
        assert_eq!(config.pipeline.stages, default_stages());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn full_file_is_parsed() {
        let config: Config = toml::from_str(
            r#"
            [source]
            types = "click keydown"
            capture = true

            [[pipeline.stages]]
            op = "filter"
            callback = "truthy"

            [[pipeline.stages]]
            op = "for_each"
            callback = "log"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.source.types, "click keydown");
        assert!(config.source.options().capture);
        assert_eq!(
            config.pipeline.stages,
            vec![
                StageSpec::new(StageOp::Filter, "truthy"),
                StageSpec::new(StageOp::ForEach, "log"),
            ]
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn unknown_stage_op_is_a_parse_error() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [[pipeline.stages]]
            op = "reduce"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("STRAND_TYPES", "tick"),
            ("STRAND_CAPTURE", "1"),
            ("STRAND_LOG_LEVEL", "trace"),
            ("STRAND_LOG_JSON", "false"),
        ]
        .into_iter()
        .collect();

        let config = apply_env_overrides(Config::default(), |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.source.types, "tick");
        assert!(config.source.capture);
        assert_eq!(config.logging.level, "trace");
        assert!(!config.logging.json);
    }

    #[test]
    fn missing_env_leaves_config_untouched() {
        let config = apply_env_overrides(Config::default(), |_| None);
        assert_eq!(config.source.types, "message");
        assert_eq!(config.logging.level, "info");
    }
}

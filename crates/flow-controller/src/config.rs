//! Controller configuration
//!
//! Defaults, overlaid by an optional TOML file, overlaid by `FLOW_*`
//! environment variables.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! json = true
//!
//! [recording]
//! policy = "escalate"
//! escalate_after = 3
//! queue_size = 512
//!
//! [execution]
//! task_concurrency = "concurrent"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::executor::{FlowExecutor, TaskConcurrency};
use crate::recording::RecordingPolicy;

pub const ENV_LOG_LEVEL: &str = "FLOW_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "FLOW_LOG_JSON";
pub const ENV_RECORDING_POLICY: &str = "FLOW_RECORDING_POLICY";
pub const ENV_RECORDING_ESCALATE_AFTER: &str = "FLOW_RECORDING_ESCALATE_AFTER";
pub const ENV_RECORDING_QUEUE_SIZE: &str = "FLOW_RECORDING_QUEUE_SIZE";
pub const ENV_TASK_CONCURRENCY: &str = "FLOW_TASK_CONCURRENCY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub logging: LoggingConfig,
    pub recording: RecordingConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `flow_controller=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    #[default]
    Continue,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub policy: RecordingMode,
    /// Consecutive failures tolerated under `escalate`
    pub escalate_after: u32,
    /// Capacity of each queue started by `ChannelWorker::from_config`
    pub queue_size: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            policy: RecordingMode::Continue,
            escalate_after: 3,
            queue_size: 1024,
        }
    }
}

impl RecordingConfig {
    pub fn policy(&self) -> RecordingPolicy {
        match self.policy {
            RecordingMode::Continue => RecordingPolicy::Continue,
            RecordingMode::Escalate => RecordingPolicy::EscalateAfter(self.escalate_after.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub task_concurrency: TaskConcurrency,
}

impl ControllerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Overlay `FLOW_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values returned by `lookup`; unset keys keep their value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(raw) = lookup(ENV_LOG_JSON) {
            self.logging.json = parse_value(ENV_LOG_JSON, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RECORDING_POLICY) {
            self.recording.policy = match raw.trim().to_ascii_lowercase().as_str() {
                "continue" => RecordingMode::Continue,
                "escalate" => RecordingMode::Escalate,
                _ => return Err(invalid(ENV_RECORDING_POLICY, &raw)),
            };
        }
        if let Some(raw) = lookup(ENV_RECORDING_ESCALATE_AFTER) {
            self.recording.escalate_after = parse_value(ENV_RECORDING_ESCALATE_AFTER, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RECORDING_QUEUE_SIZE) {
            self.recording.queue_size = parse_value(ENV_RECORDING_QUEUE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TASK_CONCURRENCY) {
            self.execution.task_concurrency = raw
                .parse()
                .map_err(|_| invalid(ENV_TASK_CONCURRENCY, &raw))?;
        }
        Ok(self)
    }

    pub fn executor(&self) -> FlowExecutor {
        FlowExecutor::new(self.execution.task_concurrency)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.recording.policy(), RecordingPolicy::Continue);
        assert_eq!(config.execution.task_concurrency, TaskConcurrency::Sequential);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ControllerConfig::from_toml_str(
            r#"
            [recording]
            policy = "escalate"
            escalate_after = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.recording.policy(), RecordingPolicy::EscalateAfter(5));
        assert_eq!(config.recording.queue_size, 1024);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ControllerConfig::from_toml_str("[execution]\ntask_concurrency = \"parallel\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::default()
            .with_overrides(lookup(&[
                (ENV_LOG_LEVEL, "debug"),
                (ENV_LOG_JSON, "true"),
                (ENV_RECORDING_POLICY, "Escalate"),
                (ENV_RECORDING_ESCALATE_AFTER, "2"),
                (ENV_TASK_CONCURRENCY, "concurrent"),
            ]))
            .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.recording.policy(), RecordingPolicy::EscalateAfter(2));
        assert_eq!(config.executor().concurrency(), TaskConcurrency::Concurrent);
    }

    #[test]
    fn test_invalid_override_names_key() {
        let err = ControllerConfig::default()
            .with_overrides(lookup(&[(ENV_RECORDING_QUEUE_SIZE, "lots")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"lots\" for FLOW_RECORDING_QUEUE_SIZE"
        );
    }

    #[test]
    fn test_zero_escalation_threshold_is_clamped() {
        let recording = RecordingConfig {
            policy: RecordingMode::Escalate,
            escalate_after: 0,
            queue_size: 1,
        };
        assert_eq!(recording.policy(), RecordingPolicy::EscalateAfter(1));
    }
}

// Fri Oct 16 2026 - Alex

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pool_workers: usize,
    pub pool_queue_capacity: usize,
    pub recover_from_panic: bool,
    pub span_prefix: Option<String>,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let workers = num_cpus::get();
        Self {
            pool_workers: workers,
            pool_queue_capacity: workers * 4,
            recover_from_panic: true,
            span_prefix: None,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON config; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_pool_workers(mut self, workers: usize) -> Self {
        self.pool_workers = workers;
        self
    }

    pub fn with_pool_queue_capacity(mut self, capacity: usize) -> Self {
        self.pool_queue_capacity = capacity;
        self
    }

    pub fn with_recover_from_panic(mut self, recover: bool) -> Self {
        self.recover_from_panic = recover;
        self
    }

    pub fn with_span_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.span_prefix = Some(prefix.into());
        self
    }

    pub fn with_log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                value: self.pool_workers,
            });
        }
        Ok(())
    }

    /// Span name for a task: the configured prefix joined to `name`.
    pub fn span_name(&self, name: &str) -> String {
        match self.span_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, name),
            _ => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.pool_workers >= 1);
        assert!(config.recover_from_panic);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = EngineConfig::new().with_pool_workers(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount { value: 0 })
        ));

        // Zero capacity is an unbuffered hand-off.
        assert!(EngineConfig::new().with_pool_queue_capacity(0).validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"pool_workers": 3, "span_prefix": "jobs"}"#).unwrap();
        assert_eq!(config.pool_workers, 3);
        assert_eq!(config.span_prefix.as_deref(), Some("jobs"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.span_name("load"), "jobs.load");
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(EngineConfig::from_json_str(r#"{"pool_workers": 0}"#).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::from_json_file("/nonexistent/koncurrent.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/koncurrent.json"));
    }

    #[test]
    fn test_round_trips_through_file() {
        let path = std::env::temp_dir().join(format!("koncurrent-config-{}.json", std::process::id()));
        let config = EngineConfig::new().with_pool_workers(2).with_log_level("debug");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = EngineConfig::from_json_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}

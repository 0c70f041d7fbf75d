//! Dockhand configuration.
//!
//! Loaded from TOML. Every section and field is optional and falls back to
//! the built-in defaults.
//!
//! ```toml
//! [session]
//! ttl_secs = 86400
//! max_sessions = 1000
//! sweep_interval_secs = 300
//!
//! [sampling]
//! max_candidates = 3
//! early_stop_threshold = 90.0
//! tiebreak_margin = 5.0
//! strategy_preference = ["security-focused", "production-ready", "upgrade-base-image"]
//! validation_enabled = true
//! validation_fail_fast = false
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Environment overrides: `DOCKHAND_LOG_LEVEL`, `DOCKHAND_LOG_JSON`,
//! `DOCKHAND_MAX_CANDIDATES`.

use std::path::{Path, PathBuf};

use dockhand_session::SessionStoreConfig;
use serde::{Deserialize, Serialize};

use crate::sampling::{
    default_strategy_preference, SamplingConfig, SelectionPolicy, ValidationConfig,
    DEFAULT_MAX_CANDIDATES, EARLY_STOP_THRESHOLD, TIEBREAK_MARGIN,
};
use crate::telemetry::parse_level;

pub const ENV_LOG_LEVEL: &str = "DOCKHAND_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "DOCKHAND_LOG_JSON";
pub const ENV_MAX_CANDIDATES: &str = "DOCKHAND_MAX_CANDIDATES";

/// Upper bound applied to `session.ttl_secs` (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    pub session: SessionSection,
    pub sampling: SamplingSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub ttl_secs: u64,
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            max_sessions: 1000,
            sweep_interval_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSection {
    pub max_candidates: usize,
    pub early_stop_threshold: f64,
    pub tiebreak_margin: f64,
    pub strategy_preference: Vec<String>,
    pub validation_enabled: bool,
    pub validation_fail_fast: bool,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            early_stop_threshold: EARLY_STOP_THRESHOLD,
            tiebreak_margin: TIEBREAK_MARGIN,
            strategy_preference: default_strategy_preference(),
            validation_enabled: true,
            validation_fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DockhandConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse `path`. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply `DOCKHAND_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(json) = lookup(ENV_LOG_JSON) {
            self.logging.json = match json.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(ConfigError::invalid(
                        ENV_LOG_JSON,
                        format!("expected a boolean, got {other:?}"),
                    ))
                }
            };
        }
        if let Some(max) = lookup(ENV_MAX_CANDIDATES) {
            self.sampling.max_candidates = max.trim().parse().map_err(|_| {
                ConfigError::invalid(ENV_MAX_CANDIDATES, format!("expected an integer, got {max:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::invalid("session.ttl_secs", "must be positive"));
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::invalid("session.max_sessions", "must be positive"));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "session.sweep_interval_secs",
                "must be positive",
            ));
        }
        if self.sampling.max_candidates == 0 {
            return Err(ConfigError::invalid("sampling.max_candidates", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.sampling.early_stop_threshold) {
            return Err(ConfigError::invalid(
                "sampling.early_stop_threshold",
                "must be within 0..=100",
            ));
        }
        if !(0.0..=100.0).contains(&self.sampling.tiebreak_margin) {
            return Err(ConfigError::invalid(
                "sampling.tiebreak_margin",
                "must be within 0..=100",
            ));
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level {:?}", self.logging.level),
            ));
        }
        Ok(())
    }

    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            default_ttl: chrono::Duration::seconds(self.session.ttl_secs.min(MAX_TTL_SECS) as i64),
            max_sessions: self.session.max_sessions,
            sweep_interval: std::time::Duration::from_secs(self.session.sweep_interval_secs),
        }
    }

    pub fn sampling_config(&self) -> SamplingConfig {
        SamplingConfig {
            max_candidates: self.sampling.max_candidates,
            validation: ValidationConfig {
                enabled: self.sampling.validation_enabled,
                fail_fast: self.sampling.validation_fail_fast,
            },
            selection: SelectionPolicy {
                early_stop_threshold: self.sampling.early_stop_threshold,
                tiebreak_margin: self.sampling.tiebreak_margin,
                strategy_preference: self.sampling.strategy_preference.clone(),
            },
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        parse_level(&self.logging.level).unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DockhandConfig::from_toml_str("").expect("parse");
        assert_eq!(config, DockhandConfig::default());
        assert_eq!(config.sampling.max_candidates, 3);
        assert_eq!(config.session.ttl_secs, 86_400);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_partial_sections() {
        let config = DockhandConfig::from_toml_str(
            r#"
            [sampling]
            early_stop_threshold = 85.0
            strategy_preference = ["minimal"]

            [logging]
            json = true
            "#,
        )
        .expect("parse");
        assert_eq!(config.sampling.early_stop_threshold, 85.0);
        assert_eq!(config.sampling.tiebreak_margin, 5.0);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");

        let sampling = config.sampling_config();
        assert_eq!(sampling.selection.strategy_preference, vec!["minimal".to_string()]);
        assert!(sampling.validation.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_JSON, "yes"),
            (ENV_MAX_CANDIDATES, "4"),
        ]
        .into_iter()
        .collect();
        let mut config = DockhandConfig::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .expect("overrides");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.sampling.max_candidates, 4);
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_bad_env_override_rejected() {
        let mut config = DockhandConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == ENV_MAX_CANDIDATES).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_candidates() {
        let mut config = DockhandConfig::default();
        config.sampling.max_candidates = 0;
        assert!(config.validate().is_err());

        let mut config = DockhandConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dockhand.toml");
        std::fs::write(&path, "[session]\nmax_sessions = 10\n").expect("write");
        let config = DockhandConfig::load(&path).expect("load");
        assert_eq!(config.session_store_config().max_sessions, 10);

        let missing = DockhandConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = DockhandConfig::default();
        let text = config.to_toml_string().expect("serialize");
        assert_eq!(DockhandConfig::from_toml_str(&text).expect("parse"), config);
    }
}

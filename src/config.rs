//! Configuration module

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::logic::model::{EngineOptions, LabelScheme, PolicyKind, ThresholdConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected pretty or json)", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Scoring artifact
    pub model_path: PathBuf,

    /// Model output to decode (first output when unset)
    pub model_output: Option<String>,

    /// Input width for artifacts with a dynamic feature dimension
    pub expected_features: Option<usize>,

    /// Class-selection policy for logit models
    pub policy: PolicyKind,

    /// Explicit label scheme; derived from the artifact when unset
    pub label_scheme: Option<LabelScheme>,

    pub thresholds: ThresholdConfig,

    /// Intra-op threads per ONNX session
    pub onnx_threads: usize,

    /// Number of ONNX sessions shared by request handlers
    pub session_pool_size: usize,

    /// Emit feature values and raw outputs as debug events
    pub log_predictions: bool,

    pub log_format: LogFormat,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            model_path: PathBuf::from("models/bitb_phishing_detector.onnx"),
            model_output: None,
            expected_features: None,
            policy: PolicyKind::ThresholdArgmax,
            label_scheme: None,
            thresholds: ThresholdConfig::default(),
            onnx_threads: 1,
            session_pool_size: default_pool_size(),
            log_predictions: false,
            log_format: LogFormat::Pretty,
            environment: "development".to_string(),
        }
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take defaults; set but
    /// unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let thresholds = ThresholdConfig {
            score_threshold: parse_or(
                &var,
                "SCORE_THRESHOLD",
                defaults.thresholds.score_threshold,
            )?,
            class_floor: parse_or(&var, "CLASS_FLOOR", defaults.thresholds.class_floor)?,
        };
        thresholds.validate().map_err(|reason| ConfigError::Invalid {
            key: "SCORE_THRESHOLD/CLASS_FLOOR",
            value: format!("{}/{}", thresholds.score_threshold, thresholds.class_floor),
            reason,
        })?;

        let config = Self {
            port: parse_or(&var, "PORT", defaults.port)?,
            model_path: var("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model_path),
            model_output: var("MODEL_OUTPUT"),
            expected_features: parse_opt(&var, "EXPECTED_FEATURES")?,
            policy: parse_or(&var, "DECISION_POLICY", defaults.policy)?,
            label_scheme: parse_opt(&var, "LABEL_SCHEME")?,
            thresholds,
            onnx_threads: parse_or(&var, "ONNX_THREADS", defaults.onnx_threads)?,
            session_pool_size: parse_or(&var, "SESSION_POOL_SIZE", defaults.session_pool_size)?,
            log_predictions: parse_or(&var, "LOG_PREDICTIONS", defaults.log_predictions)?,
            log_format: parse_or(&var, "LOG_FORMAT", defaults.log_format)?,
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
        };

        for (key, value) in [
            ("ONNX_THREADS", Some(config.onnx_threads)),
            ("SESSION_POOL_SIZE", Some(config.session_pool_size)),
            ("EXPECTED_FEATURES", config.expected_features),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Invalid {
                    key,
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(config)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            intra_threads: self.onnx_threads,
            pool_size: self.session_pool_size,
            output_name: self.model_output.clone(),
            expected_features: self.expected_features,
        }
    }
}

fn parse_opt<T, F>(var: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_path, PathBuf::from("models/bitb_phishing_detector.onnx"));
        assert_eq!(config.policy, PolicyKind::ThresholdArgmax);
        assert_eq!(config.thresholds, ThresholdConfig::default());
        assert_eq!(config.label_scheme, None);
        assert!(!config.log_predictions);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.session_pool_size >= 1);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "9090"),
            ("MODEL_PATH", "/srv/models/v2.onnx"),
            ("DECISION_POLICY", "argmax"),
            ("LABEL_SCHEME", "binary"),
            ("SCORE_THRESHOLD", "0.80"),
            ("SESSION_POOL_SIZE", "4"),
            ("EXPECTED_FEATURES", "3"),
            ("LOG_PREDICTIONS", "true"),
            ("LOG_FORMAT", "json"),
            ("ENVIRONMENT", "production"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.policy, PolicyKind::Argmax);
        assert_eq!(config.label_scheme, Some(LabelScheme::Binary));
        assert_eq!(config.thresholds.score_threshold, 0.80);
        assert_eq!(config.thresholds.class_floor, 0.38);
        assert!(config.log_predictions);
        assert!(config.is_production());

        let options = config.engine_options();
        assert_eq!(options.pool_size, 4);
        assert_eq!(options.expected_features, Some(3));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("PORT", "  "), ("DECISION_POLICY", "")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.policy, PolicyKind::ThresholdArgmax);
    }

    #[test]
    fn test_invalid_values_fail() {
        for pairs in [
            [("DECISION_POLICY", "majority")],
            [("PORT", "eighty")],
            [("SCORE_THRESHOLD", "1.5")],
            [("LABEL_SCHEME", "ternary")],
            [("SESSION_POOL_SIZE", "0")],
            [("LOG_PREDICTIONS", "yes please")],
        ] {
            assert!(load(&pairs).is_err(), "{:?} should be rejected", pairs);
        }
    }
}

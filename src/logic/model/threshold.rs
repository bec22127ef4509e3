//! Threshold Configuration
//!
//! Decision cut-offs for the scalar-score and threshold-argmax policies.

use serde::{Deserialize, Serialize};

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Scalar score at or above which the positive class wins (0.0 - 1.0)
    pub score_threshold: f64,

    /// Probability floor a non-safe class must clear under threshold-argmax
    pub class_floor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            class_floor: 0.38,
        }
    }
}

impl ThresholdConfig {
    pub fn new(score_threshold: f64) -> Self {
        Self {
            score_threshold,
            ..Default::default()
        }
    }

    /// Stricter scalar cut-off (fewer positives)
    pub fn strict() -> Self {
        Self::new(0.80)
    }

    /// Both values must be finite and within [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("class_floor", self.class_floor),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_config() {
        let config = ThresholdConfig::default();
        assert_eq!(config.score_threshold, 0.5);
        assert_eq!(config.class_floor, 0.38);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_preset() {
        let config = ThresholdConfig::strict();
        assert_eq!(config.score_threshold, 0.80);
        assert_eq!(config.class_floor, 0.38);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(ThresholdConfig::new(1.2).validate().is_err());
        assert!(ThresholdConfig::new(f64::NAN).validate().is_err());
        let config = ThresholdConfig {
            class_floor: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

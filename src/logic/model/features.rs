//! Feature Vector - validated model input
//!
//! A `FeatureVector` can only be built through [`FeatureVector::new`], which
//! checks arity and finiteness against the width the loaded model expects.
//! Nothing is padded or truncated.

use serde::{Deserialize, Serialize};

use super::error::{DetectionError, DetectionResult};

/// Feature order for the window-behaviour models
pub const WINDOW_FEATURE_LAYOUT: [&str; 3] = ["window_width", "window_height", "has_drag_behavior"];

/// Validated, immutable model input
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Box<[f32]>,
}

impl FeatureVector {
    /// Validate raw values against the expected input width.
    ///
    /// Values are narrowed to `f32` (the tensor type) before the finiteness
    /// check, so a finite `f64` that overflows `f32` is rejected too.
    pub fn new(values: &[f64], expected: usize) -> DetectionResult<Self> {
        if values.is_empty() {
            return Err(DetectionError::invalid_input(expected, "feature vector is empty"));
        }
        if values.len() != expected {
            return Err(DetectionError::invalid_input(
                expected,
                format!("got {} features", values.len()),
            ));
        }

        let narrowed: Box<[f32]> = values.iter().map(|&v| v as f32).collect();
        if let Some(pos) = narrowed.iter().position(|v| !v.is_finite()) {
            return Err(DetectionError::invalid_input(
                expected,
                format!("feature {} is not a finite number", pos),
            ));
        }

        Ok(Self { values: narrowed })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Named browser-window features, in [`WINDOW_FEATURE_LAYOUT`] order
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowFeatures {
    pub window_width: f64,
    pub window_height: f64,
    pub has_drag_behavior: bool,
}

impl WindowFeatures {
    pub fn to_values(&self) -> Vec<f64> {
        vec![
            self.window_width,
            self.window_height,
            if self.has_drag_behavior { 1.0 } else { 0.0 },
        ]
    }
}

//! Detection request/response bodies

use serde::{Deserialize, Serialize};

use crate::logic::model::PredictionResult;

/// `POST /api/bitb/detect`
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Optional so a missing field maps to our 400 body
    pub features: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectResponse {
    pub prediction: i64,
    /// `null` when the model emits class labels only
    pub score: Option<f64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_kind: Option<String>,
}

impl DetectResponse {
    /// Body for rejected input
    pub fn invalid(expected: usize) -> Self {
        Self {
            prediction: -1,
            score: Some(0.0),
            message: format!("Invalid input. Expected {} features.", expected),
            score_kind: None,
        }
    }
}

impl From<&PredictionResult> for DetectResponse {
    fn from(result: &PredictionResult) -> Self {
        Self {
            prediction: result.predicted_class as i64,
            score: result.confidence.value(),
            message: result.message().to_string(),
            score_kind: Some(result.confidence.kind_name().to_string()),
        }
    }
}

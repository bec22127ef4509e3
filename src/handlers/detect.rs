//! Detection handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::logic::model::WindowFeatures;
use crate::models::{DetectRequest, DetectResponse};
use crate::{AppError, AppResult, AppState};

/// Classify a raw feature vector
pub async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> AppResult<Json<DetectResponse>> {
    let expected = state.detector.expected_features();
    let Json(req) = payload.map_err(|e| AppError::InvalidInput {
        expected,
        detail: e.body_text(),
    })?;
    let features = req.features.ok_or_else(|| AppError::InvalidInput {
        expected,
        detail: "missing 'features' field".to_string(),
    })?;

    let result = state.detector.detect(&features)?;
    Ok(Json(DetectResponse::from(&result)))
}

/// Classify named window features
pub async fn detect_window(
    State(state): State<AppState>,
    payload: Result<Json<WindowFeatures>, JsonRejection>,
) -> AppResult<Json<DetectResponse>> {
    let Json(window) = payload.map_err(|e| AppError::InvalidInput {
        expected: state.detector.expected_features(),
        detail: e.body_text(),
    })?;

    let result = state.detector.detect(&window.to_values())?;
    Ok(Json(DetectResponse::from(&result)))
}

//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::logic::model::DetectionError;
use crate::models::DetectResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Caller errors
    InvalidInput { expected: usize, detail: String },

    // Model errors
    InferenceError(String),
    ContractViolation(String),

    // Generic errors
    InternalError(String),
}

impl From<DetectionError> for AppError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::InvalidInput { expected, detail } => {
                AppError::InvalidInput { expected, detail }
            }
            DetectionError::Inference(msg) => AppError::InferenceError(msg),
            DetectionError::ContractViolation(msg) => AppError::ContractViolation(msg),
            DetectionError::ModelLoad(msg) => AppError::InternalError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidInput { expected, detail } => {
                tracing::debug!("Rejected input: {}", detail);
                return (StatusCode::BAD_REQUEST, Json(DetectResponse::invalid(*expected)))
                    .into_response();
            }
            // Detector already logged these with context
            AppError::InferenceError(msg) => {
                tracing::debug!("Inference error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Inference failed")
            }
            AppError::ContractViolation(msg) => {
                tracing::debug!("Model contract violation: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Model output could not be interpreted")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

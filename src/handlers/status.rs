//! Engine status handler

use axum::{extract::State, Json};

use crate::logic::EngineStatus;
use crate::AppState;

pub async fn get(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.detector.status())
}

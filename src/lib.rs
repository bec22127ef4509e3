//! BitB Detector
//!
//! HTTP service that classifies browser-window behaviour as safe,
//! suspicious or a Browser-in-the-Browser phishing attack.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  POST /api/bitb/detect  (Axum)                               │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  Detector ── FeatureVector ──▶ InferenceEngine (ONNX pool)   │
//! │        │                              │                      │
//! │        │◀──────── RawModelOutput ─────┘                      │
//! │        ▼                                                     │
//! │  DecisionPolicy ──▶ PredictionResult ──▶ DetectResponse      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult};
pub use logic::Detector;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<Detector>,
    pub config: Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/bitb/detect", post(handlers::detect::detect))
        .route("/api/bitb/detect/window", post(handlers::detect::detect_window))
        .route("/api/bitb/status", get(handlers::status::get))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

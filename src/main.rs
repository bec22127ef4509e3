//! BitB Detector Server
//!
//! Loads the scoring artifact, then serves the detection API. A model that
//! fails to load stops the process before the port is bound.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bitb_detector::config::{Config, LogFormat};
use bitb_detector::logic::model::{DecisionPolicy, InferenceEngine, OnnxEngine};
use bitb_detector::{create_router, AppState, Detector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    init_tracing(config.log_format);

    tracing::info!("BitB Detector starting...");
    tracing::info!(
        model = %config.model_path.display(),
        policy = %config.policy,
        score_threshold = config.thresholds.score_threshold,
        class_floor = config.thresholds.class_floor,
        log_predictions = config.log_predictions,
        "Configuration loaded"
    );

    // Load the scoring artifact; failure is fatal
    let engine = OnnxEngine::load(&config.model_path, &config.engine_options())
        .context("Failed to load scoring artifact")?;
    let policy = DecisionPolicy::for_signature(
        config.policy,
        config.thresholds,
        config.label_scheme,
        engine.signature(),
    )
    .context("Model is incompatible with the configured decision policy")?;

    tracing::info!(
        policy = %policy.kind(),
        labels = %policy.labels(),
        input_width = engine.signature().input_width,
        sessions = engine.pool_size(),
        "Detector ready"
    );

    let state = AppState {
        detector: Arc::new(Detector::new(Arc::new(engine), policy, config.log_predictions)),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bitb_detector=info,tower_http=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

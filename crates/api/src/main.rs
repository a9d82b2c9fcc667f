use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ibov_core::pipeline::{Pipeline, Step};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ibov_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pipeline = match ibov_core::config::PipelineConfig::from_settings(&settings) {
        Ok(config) => match Pipeline::connect(config).await {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "pipeline setup failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "invalid configuration; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { pipeline });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/run", get(run))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pipeline: Option<Arc<Pipeline>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_steps: Option<Vec<Step>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RunResponse {
    fn success() -> Self {
        Self {
            status: "Success",
            failed_step: None,
            completed_steps: None,
            error: None,
        }
    }
}

async fn run(State(state): State<AppState>) -> (StatusCode, Json<RunResponse>) {
    let Some(pipeline) = &state.pipeline else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RunResponse {
                status: "Unavailable",
                failed_step: None,
                completed_steps: None,
                error: Some("pipeline is not configured".to_string()),
            }),
        );
    };

    let report = pipeline.run(chrono::Utc::now()).await;

    match report.failure() {
        None => (StatusCode::OK, Json(RunResponse::success())),
        Some((step, err)) => {
            let e = anyhow::anyhow!("ingest run {} failed at {step:?}: {err}", report.run_id);
            sentry_anyhow::capture_anyhow(&e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunResponse {
                    status: "Failed",
                    failed_step: Some(step),
                    completed_steps: Some(report.completed.clone()),
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &ibov_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

use axum::{extract::State, response::Json, routing::get, Router};
use nash_validator::{OptimalityEstimator, ScorerInfo, ValidatorMetrics};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct StatusState {
    metrics: ValidatorMetrics,
    estimator: Arc<OptimalityEstimator>,
}

/// Operator endpoints: `/health`, `/status` and prometheus `/metrics`.
pub fn router(metrics: ValidatorMetrics, estimator: Arc<OptimalityEstimator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics_text))
        .with_state(StatusState { metrics, estimator })
}

pub async fn serve<F>(addr: SocketAddr, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "📊 Status endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn status(State(state): State<StatusState>) -> Json<ScorerInfo> {
    let training = state.estimator.state().await;
    Json(ScorerInfo {
        mode: training.mode,
        samples_collected: training.samples_collected,
        sample_target: state.estimator.sample_target(),
        model_ready: training.model_ready,
    })
}

async fn metrics_text(State(state): State<StatusState>) -> String {
    state.metrics.gather()
}

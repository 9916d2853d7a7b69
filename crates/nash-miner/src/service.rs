use crate::error::Result;
use crate::miner::{ModelInfo, SettlementMiner};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use nash_protocol::{ChallengeRequest, WorkerResponse};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    miner: Arc<SettlementMiner>,
}

pub fn router(miner: Arc<SettlementMiner>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(model_info))
        .route("/challenge", post(challenge))
        .with_state(AppState { miner })
}

/// Serve the challenge endpoint until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, miner: Arc<SettlementMiner>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, info = ?miner.model_info(), "⛏️ Miner listening");

    axum::serve(listener, router(miner))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("🛑 Miner stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.miner.model_info())
}

async fn challenge(
    State(state): State<AppState>,
    Json(request): Json<ChallengeRequest>,
) -> Json<WorkerResponse> {
    Json(state.miner.respond(&request))
}

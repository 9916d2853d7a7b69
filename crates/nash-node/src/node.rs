use crate::config::{NetworkConfig, NodeConfig, SinkKind, WeightsConfig};
use crate::http::HttpWorkerClient;
use crate::membership::{FileMembership, StaticMembership};
use crate::oracle::HttpOracle;
use crate::sink::{JsonlWeightSink, LogWeightSink};
use anyhow::Result;
use nash_validator::{
    FanOutTransport, FileModelStore, MembershipSource, Mode, OptimalityEstimator,
    ValidationCycle, ValidatorConfig, ValidatorMetrics, WeightSink,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Load the estimator from `model_path` when configured, else start a fresh
/// one in training mode.
pub async fn build_estimator(config: &ValidatorConfig) -> Result<Arc<OptimalityEstimator>> {
    let estimator = match &config.model_path {
        Some(path) => {
            let store = Arc::new(FileModelStore::new(path));
            OptimalityEstimator::bootstrap(
                config.estimator.clone(),
                config.training_sample_target,
                store,
            )
            .await?
        }
        None => {
            info!("💾 No model_path configured, estimator will not be persisted");
            OptimalityEstimator::new(config.estimator.clone(), config.training_sample_target)?
        }
    };
    Ok(Arc::new(estimator))
}

pub fn build_membership(config: &NetworkConfig) -> Arc<dyn MembershipSource> {
    match &config.membership_file {
        Some(path) => {
            info!(path = %path.display(), "📂 Reading workers from membership file");
            Arc::new(FileMembership::new(path))
        }
        None => {
            if config.workers.is_empty() {
                warn!("⚠️ No workers configured, every round will abort");
            }
            Arc::new(StaticMembership::new(config.workers.clone()))
        }
    }
}

pub fn build_sink(config: &WeightsConfig) -> Arc<dyn WeightSink> {
    match config.sink {
        SinkKind::Log => Arc::new(LogWeightSink),
        SinkKind::Jsonl => {
            info!(path = %config.output.display(), "💾 Appending weights to JSONL file");
            Arc::new(JsonlWeightSink::new(&config.output))
        }
    }
}

/// Assemble the validator round loop against HTTP workers.
pub async fn build_validator(
    config: &NodeConfig,
    metrics: ValidatorMetrics,
) -> Result<ValidationCycle> {
    config.validator.validate()?;
    let estimator = build_estimator(&config.validator).await?;
    let client = HttpWorkerClient::new(CONNECT_TIMEOUT)?;
    let transport = Arc::new(FanOutTransport::new(client));

    let mut cycle = ValidationCycle::new(
        config.validator.clone(),
        build_membership(&config.network),
        transport,
        build_sink(&config.weights),
        estimator,
    )?
    .with_metrics(metrics);

    match &config.network.oracle_url {
        Some(url) => {
            info!(url = %url, "🎯 Ground-truth oracle configured");
            let oracle = HttpOracle::new(url.as_str(), config.validator.response_timeout())?;
            cycle = cycle.with_oracle(Arc::new(oracle));
        }
        None if cycle.estimator().state().await.mode == Mode::Training => {
            warn!("⚠️ No oracle_url configured, training rounds use the fidelity proxy");
        }
        None => {}
    }
    Ok(cycle)
}

/// Resolves once `signal` fires. If the signal handler fails to install the
/// error is logged and the future never resolves, so a server waiting on it
/// keeps running instead of stopping silently.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "❌ Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

use crate::config::NodeConfig;
use crate::membership::StaticMembership;
use crate::node::{build_estimator, build_sink};
use crate::oracle::SyntheticOracle;
use anyhow::Result;
use async_trait::async_trait;
use nash_miner::{MinerConfig, SettlementMiner};
use nash_protocol::{ChallengeRequest, WorkerHandle, WorkerResponse};
use nash_validator::{
    FanOutTransport, Mode, ValidationCycle, ValidatorError, ValidatorMetrics, WorkerClient,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Routes queries to reference miners running in this process.
pub struct LocalWorkerClient {
    miners: HashMap<u32, Arc<SettlementMiner>>,
}

impl LocalWorkerClient {
    /// Spawn `count` miners; with a base seed, miner `uid` uses `seed + uid`.
    pub fn spawn(count: u32, config: &MinerConfig) -> Result<Self> {
        let mut miners = HashMap::with_capacity(count as usize);
        for uid in 0..count {
            let miner = SettlementMiner::new(MinerConfig {
                seed: config.seed.map(|s| s.wrapping_add(uid as u64)),
                ..config.clone()
            })?;
            miners.insert(uid, Arc::new(miner));
        }
        Ok(Self { miners })
    }

    pub fn handles(&self) -> Vec<WorkerHandle> {
        let mut uids: Vec<u32> = self.miners.keys().copied().collect();
        uids.sort_unstable();
        uids.into_iter()
            .map(|uid| WorkerHandle::new(uid, format!("local://worker-{}", uid)))
            .collect()
    }
}

#[async_trait]
impl WorkerClient for LocalWorkerClient {
    async fn query(
        &self,
        worker: &WorkerHandle,
        request: &ChallengeRequest,
    ) -> nash_validator::Result<WorkerResponse> {
        let miner = self
            .miners
            .get(&worker.uid)
            .ok_or_else(|| {
                ValidatorError::Transport(format!("unknown local worker {}", worker))
            })?
            .clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || miner.respond(&request))
            .await
            .map_err(|e| ValidatorError::Transport(e.to_string()))
    }
}

/// Run `rounds` validator rounds against `workers` in-process miners, with
/// ground truth from a [`SyntheticOracle`].
pub async fn run(config: &NodeConfig, workers: u32, rounds: u64) -> Result<Vec<RoundSummary>> {
    let client = LocalWorkerClient::spawn(workers, &config.miner)?;
    let handles = client.handles();
    let metrics = ValidatorMetrics::new()?;
    let oracle = SyntheticOracle::new(config.validator.estimator.scales);

    let mut cycle = ValidationCycle::new(
        config.validator.clone(),
        Arc::new(StaticMembership::new(handles)),
        Arc::new(FanOutTransport::new(client)),
        build_sink(&config.weights),
        build_estimator(&config.validator).await?,
    )?
    .with_metrics(metrics)
    .with_oracle(Arc::new(oracle));

    info!(workers, rounds, "🎮 Starting local simulation");
    let mut summaries = Vec::with_capacity(rounds as usize);
    for _ in 0..rounds {
        let report = cycle.run_round().await;
        summaries.push(RoundSummary {
            round: report.round,
            mode: report.mode,
            published: report.is_published(),
            valid: report.valid,
            invalid: report.invalid,
            timed_out: report.timed_out,
            weights: report.weights.map(|w| w.into_inner()).unwrap_or_default(),
        });
    }

    let info = cycle.scorer_info().await;
    info!(
        mode = %info.mode,
        samples = info.samples_collected,
        target = info.sample_target,
        "🎉 Simulation finished"
    );
    Ok(summaries)
}

/// Condensed round result printed by `nash simulate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: u64,
    pub mode: Mode,
    pub published: bool,
    pub valid: usize,
    pub invalid: usize,
    pub timed_out: usize,
    pub weights: Vec<f64>,
}

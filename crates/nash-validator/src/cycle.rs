use crate::aggregator::{ScoreAggregator, ScoreVector};
use crate::challenge::ChallengeGenerator;
use crate::commitment::CommitmentExtractor;
use crate::config::{EstimatorScales, ValidatorConfig};
use crate::directory::WorkerDirectory;
use crate::error::Result;
use crate::estimator::{Estimate, Mode, OptimalityEstimator, TrainOutcome};
use crate::fidelity::FidelityScorer;
use crate::interfaces::{
    GroundTruthOracle, MembershipSource, OptimalSettlement, WeightSink, WorkerReply,
    WorkerTransport,
};
use crate::metrics::ValidatorMetrics;
use crate::response::{ResponseValidator, ValidatedResponse};
use nash_protocol::{ChallengeRequest, Commitment, Intent, WorkerHandle};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Where the cycle is within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingChallenge,
    AwaitingResponses,
    Scoring,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The directory had no workers, not even a stale list.
    NoWorkers,
    BroadcastFailed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NoWorkers => write!(f, "no workers available"),
            AbortReason::BroadcastFailed(e) => write!(f, "broadcast failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Published,
    /// Weights were computed but the sink rejected them. Not retried.
    PublishFailed(String),
    Aborted(AbortReason),
}

/// Summary of one round, returned by [`ValidationCycle::run_round`].
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u64,
    /// Scoring branch this round used, fixed at round start.
    pub mode: Mode,
    pub workers: Vec<WorkerHandle>,
    pub valid: usize,
    pub invalid: usize,
    pub timed_out: usize,
    pub weights: Option<ScoreVector>,
    pub training: Option<TrainOutcome>,
    pub outcome: RoundOutcome,
    pub duration: Duration,
}

impl RoundReport {
    pub fn is_published(&self) -> bool {
        self.outcome == RoundOutcome::Published
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RoundOutcome::Aborted(_))
    }
}

/// Snapshot of the estimator's progress for operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorerInfo {
    pub mode: Mode,
    pub samples_collected: u64,
    pub sample_target: u64,
    pub model_ready: bool,
}

/// Per-round scoring reference, resolved once before replies are scored.
enum ScoringBasis {
    GroundTruth(OptimalSettlement),
    Fidelity,
    Estimate(Estimate),
    Unavailable,
}

impl ScoringBasis {
    fn label(&self) -> &'static str {
        match self {
            ScoringBasis::GroundTruth(_) => "ground_truth",
            ScoringBasis::Fidelity => "fidelity",
            ScoringBasis::Estimate(_) => "estimate",
            ScoringBasis::Unavailable => "unavailable",
        }
    }
}

/// Score of a proposed point against a known-optimal settlement: decays
/// exponentially with the distance between the two in normalised units.
pub fn settlement_score(
    point: [f32; 2],
    settlement: &OptimalSettlement,
    scales: &EstimatorScales,
    decay: f64,
) -> f64 {
    let dx = (f64::from(point[0]) - settlement.price) / scales.price_scale;
    let dy = (f64::from(point[1]) - settlement.quantity) / scales.quantity_scale;
    (-decay * dx.hypot(dy)).exp()
}

/// Drives challenge → collect → score → publish rounds.
pub struct ValidationCycle {
    config: ValidatorConfig,
    directory: WorkerDirectory,
    transport: Arc<dyn WorkerTransport>,
    sink: Arc<dyn WeightSink>,
    estimator: Arc<OptimalityEstimator>,
    oracle: Option<Arc<dyn GroundTruthOracle>>,
    fidelity: FidelityScorer,
    generator: ChallengeGenerator,
    extractor: CommitmentExtractor,
    validator: ResponseValidator,
    aggregator: ScoreAggregator,
    metrics: Option<ValidatorMetrics>,
    phase: watch::Sender<RoundPhase>,
    rounds: u64,
}

impl ValidationCycle {
    pub fn new(
        config: ValidatorConfig,
        membership: Arc<dyn MembershipSource>,
        transport: Arc<dyn WorkerTransport>,
        sink: Arc<dyn WeightSink>,
        estimator: Arc<OptimalityEstimator>,
    ) -> Result<Self> {
        config.validate()?;
        let fidelity = FidelityScorer::new(config.estimator.seed.map(|s| s.wrapping_add(1)))?;
        let (phase, _) = watch::channel(RoundPhase::Done);

        Ok(Self {
            directory: WorkerDirectory::new(membership, config.cache_ttl()),
            transport,
            sink,
            estimator,
            oracle: None,
            fidelity,
            generator: ChallengeGenerator::new(config.challenge_seed),
            extractor: CommitmentExtractor::new(config.commitment.clone()),
            validator: ResponseValidator,
            aggregator: ScoreAggregator::from_config(&config),
            metrics: None,
            phase,
            rounds: 0,
            config,
        })
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn GroundTruthOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_metrics(mut self, metrics: ValidatorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn estimator(&self) -> &Arc<OptimalityEstimator> {
        &self.estimator
    }

    pub fn phase(&self) -> RoundPhase {
        *self.phase.borrow()
    }

    pub fn rounds_started(&self) -> u64 {
        self.rounds
    }

    pub async fn scorer_info(&self) -> ScorerInfo {
        let state = self.estimator.state().await;
        ScorerInfo {
            mode: state.mode,
            samples_collected: state.samples_collected,
            sample_target: self.estimator.sample_target(),
            model_ready: state.model_ready,
        }
    }

    /// Run rounds back to back at the configured interval until `shutdown`
    /// turns true or its sender is dropped. A round in progress always
    /// completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.round_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let info = self.scorer_info().await;
        info!(
            mode = %info.mode,
            samples = info.samples_collected,
            target = info.sample_target,
            interval_secs = self.config.round_interval_secs,
            "🚀 Validation cycle started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    self.run_round().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(rounds = self.rounds, "🛑 Validation cycle stopped");
    }

    /// Execute one full round.
    pub async fn run_round(&mut self) -> RoundReport {
        let started = Instant::now();
        self.rounds += 1;
        let round = self.rounds;
        let mode = self.estimator.state().await.mode;

        self.phase.send_replace(RoundPhase::AwaitingChallenge);
        let workers = self.directory.get().await;
        if workers.is_empty() {
            warn!(round, "⚠️ No workers available, skipping round");
            return self.abort(round, mode, workers, AbortReason::NoWorkers, started);
        }

        let intent = *self.generator.generate();
        let commitment = self.extractor.extract(&intent);
        let request = ChallengeRequest::from_intent(&intent);

        self.phase.send_replace(RoundPhase::AwaitingResponses);
        let replies = match self
            .transport
            .broadcast(&request, &workers, self.config.response_timeout())
            .await
        {
            Ok(replies) if replies.len() == workers.len() => replies,
            Ok(replies) => {
                let reason = format!("{} replies for {} workers", replies.len(), workers.len());
                error!(round, %reason, "❌ Broadcast returned misaligned replies");
                let reason = AbortReason::BroadcastFailed(reason);
                return self.abort(round, mode, workers, reason, started);
            }
            Err(e) => {
                error!(round, error = %e, "❌ Broadcast failed");
                let reason = AbortReason::BroadcastFailed(e.to_string());
                return self.abort(round, mode, workers, reason, started);
            }
        };

        self.phase.send_replace(RoundPhase::Scoring);
        let basis = self.scoring_basis(mode, &intent, &commitment).await;

        let mut scores = vec![0.0; workers.len()];
        let (mut valid, mut invalid, mut timed_out) = (0usize, 0usize, 0usize);
        for (idx, (worker, reply)) in workers.iter().zip(&replies).enumerate() {
            match reply {
                WorkerReply::Responded(response) => match self.validator.check(response) {
                    Ok(validated) => {
                        valid += 1;
                        scores[idx] = self.score(&basis, &intent, &validated);
                    }
                    Err(reason) => {
                        invalid += 1;
                        debug!(round, worker = %worker, %reason, "Response rejected");
                    }
                },
                WorkerReply::TimedOut => {
                    timed_out += 1;
                    debug!(round, worker = %worker, "Worker timed out");
                }
                WorkerReply::Failed(e) => {
                    invalid += 1;
                    debug!(round, worker = %worker, error = %e, "Worker query failed");
                }
            }
        }

        let training = match &basis {
            ScoringBasis::GroundTruth(settlement) => self.train(&commitment, settlement).await,
            _ => None,
        };

        let weights = self.aggregator.aggregate(&scores, valid, workers.len());
        let uids: Vec<u32> = workers.iter().map(|w| w.uid).collect();
        let outcome = match self.sink.publish(&uids, weights.as_slice()).await {
            Ok(()) => RoundOutcome::Published,
            Err(e) => {
                warn!(round, error = %e, "⚠️ Failed to publish weights");
                if let Some(m) = &self.metrics {
                    m.publish_failures.inc();
                }
                RoundOutcome::PublishFailed(e.to_string())
            }
        };
        self.phase.send_replace(RoundPhase::Done);

        let duration = started.elapsed();
        info!(
            round,
            mode = %mode,
            basis = basis.label(),
            valid,
            invalid,
            timed_out,
            total = workers.len(),
            elapsed_ms = duration.as_millis() as u64,
            "✅ Validation round completed"
        );
        if duration > self.config.round_soft_deadline() {
            warn!(
                round,
                elapsed_ms = duration.as_millis() as u64,
                deadline_ms = self.config.round_soft_deadline_ms,
                "⏱️ Round exceeded soft deadline"
            );
        }

        if let Some(m) = &self.metrics {
            m.rounds_completed.inc();
            m.responses_valid.inc_by(valid as u64);
            m.responses_invalid.inc_by(invalid as u64);
            m.responses_timed_out.inc_by(timed_out as u64);
            m.round_duration.observe(duration.as_secs_f64());
            let state = self.estimator.state().await;
            m.training_samples.set(state.samples_collected as i64);
            m.mode.set(state.mode.as_gauge());
        }

        RoundReport {
            round,
            mode,
            workers,
            valid,
            invalid,
            timed_out,
            weights: Some(weights),
            training,
            outcome,
            duration,
        }
    }

    async fn scoring_basis(
        &self,
        mode: Mode,
        intent: &Intent,
        commitment: &Commitment,
    ) -> ScoringBasis {
        match mode {
            Mode::Training => {
                let Some(oracle) = &self.oracle else {
                    return ScoringBasis::Fidelity;
                };
                match oracle.solve(intent).await {
                    Ok(Some(settlement)) => ScoringBasis::GroundTruth(settlement),
                    Ok(None) => {
                        debug!("No ground truth for this intent, using fidelity proxy");
                        ScoringBasis::Fidelity
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "⚠️ Ground-truth oracle failed, using fidelity proxy"
                        );
                        ScoringBasis::Fidelity
                    }
                }
            }
            Mode::Production => match self.estimator.estimate(commitment).await {
                Ok(estimate) => ScoringBasis::Estimate(estimate),
                Err(e) => {
                    warn!(error = %e, "⚠️ Estimator inference failed, scoring round as zero");
                    if let Some(m) = &self.metrics {
                        m.estimator_failures.inc();
                    }
                    ScoringBasis::Unavailable
                }
            },
        }
    }

    fn score(
        &self,
        basis: &ScoringBasis,
        intent: &Intent,
        response: &ValidatedResponse<'_>,
    ) -> f64 {
        match basis {
            ScoringBasis::GroundTruth(settlement) => settlement_score(
                response.point,
                settlement,
                &self.config.estimator.scales,
                self.config.ground_truth_decay,
            ),
            ScoringBasis::Fidelity => match self.fidelity.score(intent, response) {
                Ok(score) => score,
                Err(e) => {
                    warn!(error = %e, "⚠️ Fidelity scoring failed, scoring response as zero");
                    0.0
                }
            },
            ScoringBasis::Estimate(estimate) => {
                let bonus = self.config.production_bonus_multiplier;
                (estimate.optimality_probability * bonus).min(1.0)
            }
            ScoringBasis::Unavailable => 0.0,
        }
    }

    async fn train(
        &self,
        commitment: &Commitment,
        settlement: &OptimalSettlement,
    ) -> Option<TrainOutcome> {
        let target = settlement.to_target(&self.config.estimator.scales);
        match self.estimator.train_on_sample(commitment, &target).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "⚠️ Estimator training step failed, sample dropped");
                if let Some(m) = &self.metrics {
                    m.estimator_failures.inc();
                }
                None
            }
        }
    }

    fn abort(
        &self,
        round: u64,
        mode: Mode,
        workers: Vec<WorkerHandle>,
        reason: AbortReason,
        started: Instant,
    ) -> RoundReport {
        self.phase.send_replace(RoundPhase::Done);
        if let Some(m) = &self.metrics {
            m.rounds_aborted.inc();
        }
        RoundReport {
            round,
            mode,
            workers,
            valid: 0,
            invalid: 0,
            timed_out: 0,
            weights: None,
            training: None,
            outcome: RoundOutcome::Aborted(reason),
            duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_score_peaks_at_optimum() {
        let settlement = OptimalSettlement {
            price: 1.5,
            quantity: 250.0,
            utility: 0.7,
            pareto_optimal: true,
        };
        let scales = EstimatorScales::default();

        let exact = settlement_score([1.5, 250.0], &settlement, &scales, 1.0);
        let near = settlement_score([1.6, 260.0], &settlement, &scales, 1.0);
        let far = settlement_score([3.0, 0.0], &settlement, &scales, 1.0);

        assert!((exact - 1.0).abs() < 1e-9);
        assert!(exact > near && near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn test_abort_reason_display() {
        assert_eq!(AbortReason::NoWorkers.to_string(), "no workers available");
        assert_eq!(
            AbortReason::BroadcastFailed("dendrite down".into()).to_string(),
            "broadcast failed: dendrite down"
        );
    }
}

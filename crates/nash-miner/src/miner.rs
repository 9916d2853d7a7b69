use crate::error::Result;
use crate::model::{EquilibriumSolver, IntentEncoder, REPRESENTATION_DIM};
use nash_protocol::{ChallengeRequest, WorkerResponse};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Seed for model initialisation (None = OS entropy)
    pub seed: Option<u64>,
    /// Inference budget; overruns are logged, never cut short
    pub inference_budget_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            inference_budget_ms: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub encoder_params: usize,
    pub solver_params: usize,
    pub representation_dim: usize,
    pub inference_budget_ms: u64,
}

/// Stateless encode → solve worker.
pub struct SettlementMiner {
    encoder: IntentEncoder,
    solver: EquilibriumSolver,
    budget: Duration,
}

impl SettlementMiner {
    pub fn new(config: MinerConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            encoder: IntentEncoder::new(&mut rng)?,
            solver: EquilibriumSolver::new(&mut rng)?,
            budget: Duration::from_millis(config.inference_budget_ms),
        })
    }

    /// Answer a challenge. Invalid requests and inference errors produce the
    /// empty response.
    pub fn respond(&self, request: &ChallengeRequest) -> WorkerResponse {
        let started = Instant::now();
        let result = request
            .validate()
            .map_err(Into::into)
            .and_then(|intent| self.infer(intent));

        match result {
            Ok((representation, point)) => {
                let elapsed = started.elapsed();
                if elapsed > self.budget {
                    warn!(
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        budget_ms = self.budget.as_millis() as u64,
                        "⏱️ Inference exceeded budget"
                    );
                } else {
                    debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
                }
                WorkerResponse::new(representation, point)
            }
            Err(e) => {
                warn!(error = %e, "⚠️ Challenge rejected, returning empty response");
                WorkerResponse::empty()
            }
        }
    }

    pub fn infer(&self, intent: &[f32]) -> Result<(Vec<f32>, Vec<f32>)> {
        let representation = self.encoder.encode(intent)?;
        let point = self.solver.solve(&representation)?;
        Ok((representation, point))
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            encoder_params: self.encoder.parameter_count(),
            solver_params: self.solver.parameter_count(),
            representation_dim: REPRESENTATION_DIM,
            inference_budget_ms: self.budget.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nash_protocol::{Intent, POINT_DIM};

    fn miner() -> SettlementMiner {
        SettlementMiner::new(MinerConfig {
            seed: Some(21),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_valid_challenge_gets_full_response() {
        let response = miner().respond(&ChallengeRequest::from_intent(&Intent::zeros()));
        let (representation, point) = response.into_parts().unwrap();
        assert_eq!(representation.len(), REPRESENTATION_DIM);
        assert_eq!(point.len(), POINT_DIM);
    }

    #[test]
    fn test_invalid_challenges_get_empty_response() {
        let miner = miner();
        assert!(miner.respond(&ChallengeRequest::default()).is_empty());

        let wrong_width = ChallengeRequest {
            raw_intent: Some(vec![1.0; 4]),
            context: None,
        };
        assert!(miner.respond(&wrong_width).is_empty());
    }

    #[test]
    fn test_seeded_miners_agree() {
        let request = ChallengeRequest::from_intent(&Intent::new([0.3; 10]));
        assert_eq!(miner().respond(&request), miner().respond(&request));
    }

    #[test]
    fn test_model_info() {
        let info = miner().model_info();
        assert_eq!(info.representation_dim, 256);
        assert_eq!(info.inference_budget_ms, 45);
        assert!(info.encoder_params > 0 && info.solver_params > 0);
    }
}

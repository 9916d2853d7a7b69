//! Boundary collaborators of the validation cycle.
//!
//! Network transport, membership, weight publication and the ground-truth
//! solver live outside this crate; the cycle only sees these traits.

use crate::config::EstimatorScales;
use crate::error::Result;
use crate::estimator::ESTIMATE_DIM;
use async_trait::async_trait;
use nash_protocol::{ChallengeRequest, Intent, WorkerHandle, WorkerResponse};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of querying a single worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    Responded(WorkerResponse),
    /// The worker did not answer within the round timeout.
    TimedOut,
    /// The worker could not be reached or returned garbage.
    Failed(String),
}

/// Sends one challenge to many workers.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Returns one reply per worker, in the order of `workers`. An `Err`
    /// means the broadcast as a whole failed and the round is abandoned.
    async fn broadcast(
        &self,
        request: &ChallengeRequest,
        workers: &[WorkerHandle],
        timeout: Duration,
    ) -> Result<Vec<WorkerReply>>;
}

/// Point-to-point query to one worker, composed by `FanOutTransport`.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn query(
        &self,
        worker: &WorkerHandle,
        request: &ChallengeRequest,
    ) -> Result<WorkerResponse>;
}

/// Where the current worker set comes from.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn list_workers(&self) -> Result<Vec<WorkerHandle>>;
}

/// Destination for each round's normalised weights.
#[async_trait]
pub trait WeightSink: Send + Sync {
    async fn publish(&self, worker_ids: &[u32], weights: &[f64]) -> Result<()>;
}

/// Known-optimal settlement for a synthetic intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalSettlement {
    pub price: f64,
    pub quantity: f64,
    pub utility: f64,
    pub pareto_optimal: bool,
}

impl OptimalSettlement {
    /// Training target in model units: every component mapped into `[0, 1]`
    /// using the same scales the estimator de-normalises with.
    pub fn to_target(&self, scales: &EstimatorScales) -> [f32; ESTIMATE_DIM] {
        let unit = |v: f64| v.clamp(0.0, 1.0) as f32;
        [
            if self.pareto_optimal { 1.0 } else { 0.0 },
            unit(self.utility),
            unit(self.price / scales.price_scale),
            unit(self.quantity / scales.quantity_scale),
        ]
    }
}

/// External solver that knows the optimal settlement of synthetic intents.
#[async_trait]
pub trait GroundTruthOracle: Send + Sync {
    /// `Ok(None)` means no ground truth is available for this intent.
    async fn solve(&self, intent: &Intent) -> Result<Option<OptimalSettlement>>;
}

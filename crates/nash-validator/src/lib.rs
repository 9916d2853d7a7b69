/*!
# NASH Validator

Dual-mode scoring pipeline for the NASH settlement marketplace. Each round
the validator challenges every worker with a synthetic intent, checks their
proposed settlements, scores them and publishes normalised weights.

## Modes

- **Training**: a ground-truth oracle scores workers by distance to the known
  optimal settlement, and the same settlement trains the optimality
  estimator. Without an oracle the learned fidelity proxy scores workers.
- **Production**: the trained estimator judges settlements from the
  commitment view alone.

The switch from training to production happens once, when the estimator has
seen its configured number of samples, or at startup when a checkpoint is
loaded.

## Module Structure

- **challenge**: synthetic intent generation
- **commitment**: intent → commitment projection
- **response**: structural and numeric reply checks
- **estimator**: online-trained optimality estimator and its state machine
- **fidelity**: fidelity proxy scorer
- **aggregator**: score clamping, penalty and normalisation
- **directory**: TTL-cached worker list
- **transport**: concurrent fan-out with per-worker timeouts
- **cycle**: round orchestration
- **interfaces**: external collaborator traits
- **persistence**: estimator checkpoints
- **metrics**: prometheus round metrics
*/

pub mod aggregator;
pub mod challenge;
pub mod commitment;
pub mod config;
pub mod cycle;
pub mod directory;
pub mod error;
pub mod estimator;
pub mod fidelity;
pub mod interfaces;
pub mod metrics;
pub mod persistence;
pub mod response;
pub mod transport;

pub use aggregator::{ScoreAggregator, ScoreVector};
pub use challenge::ChallengeGenerator;
pub use commitment::{CommitmentExtractor, RoleFlags, FEATURES_PER_PARTY, PARTY_COUNT};
pub use config::{
    CommitmentConfig, EstimatorConfig, EstimatorScales, NeutralEstimate, RoleFlagPolicy,
    ValidatorConfig,
};
pub use cycle::{
    settlement_score, AbortReason, RoundOutcome, RoundPhase, RoundReport, ScorerInfo,
    ValidationCycle,
};
pub use directory::WorkerDirectory;
pub use error::{Result, ValidatorError};
pub use estimator::{Estimate, Mode, OptimalityEstimator, TrainOutcome, TrainingState};
pub use fidelity::FidelityScorer;
pub use interfaces::{
    GroundTruthOracle, MembershipSource, OptimalSettlement, WeightSink, WorkerClient,
    WorkerReply, WorkerTransport,
};
pub use metrics::ValidatorMetrics;
pub use persistence::{FileModelStore, ModelCheckpoint, ModelStore};
pub use response::{Rejection, ResponseValidator, ValidatedResponse};
pub use transport::FanOutTransport;

//! Online-trained optimality estimator.
//!
//! The estimator exclusively owns its network, optimiser and training
//! counters behind one lock. Inference takes a shared read guard, training
//! an exclusive write guard, so training steps never interleave and an
//! estimate always sees either the fully prior or the fully updated
//! parameters.

mod model;
mod state;

pub use model::{build_commitment_model, ensure_compatible, Estimate, ESTIMATE_DIM};
pub use state::{Mode, TrainingState};

use crate::config::EstimatorConfig;
use crate::error::Result;
use crate::persistence::{ModelCheckpoint, ModelStore};
use nash_nn::{mse_loss, Adam, AdamConfig, NnError, Sequential};
use nash_protocol::Commitment;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of one `train_on_sample` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// Target already reached (or training disabled); nothing changed.
    Skipped,
    /// One gradient step applied.
    Trained { samples: u64, loss: f32 },
    /// The step that reached the target; the estimator is now in production.
    Completed { samples: u64, loss: f32 },
}

struct EstimatorCore {
    model: Sequential,
    optimizer: Adam,
    rng: StdRng,
    state: TrainingState,
}

pub struct OptimalityEstimator {
    core: RwLock<EstimatorCore>,
    config: EstimatorConfig,
    sample_target: u64,
    store: Option<Arc<dyn ModelStore>>,
}

impl OptimalityEstimator {
    /// Freshly initialised estimator in training mode.
    pub fn new(config: EstimatorConfig, sample_target: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let model = build_commitment_model(&config, &mut rng)?;
        let state = TrainingState::fresh(sample_target);
        Ok(Self::assemble(config, sample_target, model, rng, state))
    }

    /// Estimator restored from a checkpoint; starts in production mode.
    pub fn from_checkpoint(
        config: EstimatorConfig,
        sample_target: u64,
        checkpoint: ModelCheckpoint,
    ) -> Result<Self> {
        config.validate()?;
        ensure_compatible(&checkpoint.model)?;
        let state = TrainingState::restored(checkpoint.state.samples_collected);
        Ok(Self::assemble(
            config.clone(),
            sample_target,
            checkpoint.model,
            seeded_rng(config.seed),
            state,
        ))
    }

    /// Load from `store` if a usable checkpoint exists, otherwise start
    /// training. Load failures are logged and fall back to training mode.
    /// The store is kept as the save point for when training completes.
    pub async fn bootstrap(
        config: EstimatorConfig,
        sample_target: u64,
        store: Arc<dyn ModelStore>,
    ) -> Result<Self> {
        let estimator = match store.load().await {
            Ok(Some(checkpoint)) => {
                match Self::from_checkpoint(config.clone(), sample_target, checkpoint) {
                    Ok(estimator) => {
                        info!(
                            store = %store.describe(),
                            "🚀 Pre-trained estimator loaded, production mode"
                        );
                        estimator
                    }
                    Err(e) => {
                        warn!(
                            store = %store.describe(),
                            error = %e,
                            "⚠️ Checkpoint rejected, training from scratch"
                        );
                        Self::new(config, sample_target)?
                    }
                }
            }
            Ok(None) => {
                info!(
                    store = %store.describe(),
                    target = sample_target,
                    "🎓 No pre-trained estimator, training mode"
                );
                Self::new(config, sample_target)?
            }
            Err(e) => {
                warn!(
                    store = %store.describe(),
                    error = %e,
                    "⚠️ Failed to load checkpoint, training from scratch"
                );
                Self::new(config, sample_target)?
            }
        };
        Ok(estimator.with_store(store))
    }

    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn assemble(
        config: EstimatorConfig,
        sample_target: u64,
        model: Sequential,
        rng: StdRng,
        state: TrainingState,
    ) -> Self {
        let optimizer = Adam::new(AdamConfig {
            learning_rate: config.learning_rate,
            ..Default::default()
        });
        Self {
            core: RwLock::new(EstimatorCore {
                model,
                optimizer,
                rng,
                state,
            }),
            config,
            sample_target,
            store: None,
        }
    }

    pub fn sample_target(&self) -> u64 {
        self.sample_target
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub async fn state(&self) -> TrainingState {
        self.core.read().await.state
    }

    /// Estimate settlement quality for `commitment`.
    ///
    /// Before the model is ready this is the configured neutral estimate.
    /// Afterwards it is a pure inference pass: repeated calls with no
    /// training in between return identical values.
    pub async fn estimate(&self, commitment: &Commitment) -> Result<Estimate> {
        let core = self.core.read().await;
        if !core.state.model_ready {
            return Ok(Estimate::neutral(&self.config.neutral));
        }
        let output = core.model.forward(commitment.as_slice())?;
        Estimate::from_output(&output, &self.config.scales)
    }

    /// Apply one gradient step towards `target`, a 4-vector already
    /// normalised into `[0, 1]`.
    ///
    /// No-op once the sample target is reached. On error nothing is mutated
    /// and the sample is not counted.
    pub async fn train_on_sample(
        &self,
        commitment: &Commitment,
        target: &[f32; ESTIMATE_DIM],
    ) -> Result<TrainOutcome> {
        let outcome = {
            let mut guard = self.core.write().await;
            let core = &mut *guard;
            if core.state.model_ready || core.state.samples_collected >= self.sample_target {
                return Ok(TrainOutcome::Skipped);
            }

            let tape = core
                .model
                .forward_train(commitment.as_slice(), &mut core.rng)?;
            let (loss, grad) = mse_loss(tape.output(), target)?;
            if !loss.is_finite() {
                return Err(NnError::NonFinite("training loss").into());
            }
            let grads = core.model.backward(&tape, &grad)?;
            core.optimizer.step(core.model.parameters_mut(), &grads)?;

            core.state.samples_collected += 1;
            let samples = core.state.samples_collected;
            if samples >= self.sample_target {
                core.state.complete();
                info!(samples, loss, "🎉 Estimator training complete, switching to production");
                TrainOutcome::Completed { samples, loss }
            } else {
                debug!(samples, target = self.sample_target, loss, "Estimator trained on sample");
                TrainOutcome::Trained { samples, loss }
            }
        };

        if matches!(outcome, TrainOutcome::Completed { .. }) {
            self.persist().await;
        }
        Ok(outcome)
    }

    /// Snapshot of the current parameters and training state.
    pub async fn checkpoint(&self) -> ModelCheckpoint {
        let core = self.core.read().await;
        ModelCheckpoint::new(core.model.clone(), core.state)
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let checkpoint = self.checkpoint().await;
        if let Err(e) = store.save(&checkpoint).await {
            warn!(store = %store.describe(), error = %e, "⚠️ Failed to save trained estimator");
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nash_protocol::COMMITMENT_DIM;

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            seed: Some(17),
            ..Default::default()
        }
    }

    fn commitment(value: f32) -> Commitment {
        Commitment::new([value; COMMITMENT_DIM])
    }

    #[tokio::test]
    async fn test_neutral_until_ready() {
        let estimator = OptimalityEstimator::new(config(), 5).unwrap();
        let estimate = estimator.estimate(&commitment(0.3)).await.unwrap();
        assert_eq!(estimate, Estimate::neutral(&config().neutral));
        assert_eq!(estimator.state().await.mode, Mode::Training);
    }

    #[tokio::test]
    async fn test_transition_on_target() {
        let estimator = OptimalityEstimator::new(config(), 2).unwrap();
        let target = [1.0, 0.6, 0.5, 0.4];

        assert!(matches!(
            estimator.train_on_sample(&commitment(0.2), &target).await.unwrap(),
            TrainOutcome::Trained { samples: 1, .. }
        ));
        assert!(matches!(
            estimator.train_on_sample(&commitment(0.4), &target).await.unwrap(),
            TrainOutcome::Completed { samples: 2, .. }
        ));
        assert_eq!(
            estimator.train_on_sample(&commitment(0.6), &target).await.unwrap(),
            TrainOutcome::Skipped
        );

        let state = estimator.state().await;
        assert_eq!(state, TrainingState::restored(2));
    }

    #[tokio::test]
    async fn test_zero_target_never_trains() {
        let estimator = OptimalityEstimator::new(config(), 0).unwrap();
        assert_eq!(
            estimator
                .train_on_sample(&commitment(0.1), &[0.0; ESTIMATE_DIM])
                .await
                .unwrap(),
            TrainOutcome::Skipped
        );
        let state = estimator.state().await;
        assert_eq!(state.mode, Mode::Production);
        assert!(!state.model_ready);
    }

    #[tokio::test]
    async fn test_from_checkpoint_starts_in_production() {
        let trained = OptimalityEstimator::new(config(), 1).unwrap();
        trained
            .train_on_sample(&commitment(0.5), &[1.0, 0.5, 0.5, 0.5])
            .await
            .unwrap();
        let checkpoint = trained.checkpoint().await;

        let restored = OptimalityEstimator::from_checkpoint(config(), 10_000, checkpoint).unwrap();
        let state = restored.state().await;
        assert!(state.model_ready);
        assert_eq!(state.mode, Mode::Production);

        let probe = commitment(0.5);
        assert_eq!(
            restored.estimate(&probe).await.unwrap(),
            trained.estimate(&probe).await.unwrap()
        );
    }
}

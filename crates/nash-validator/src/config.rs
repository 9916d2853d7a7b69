use crate::error::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Validator pipeline configuration.
///
/// Every tunable of the round loop, the aggregator and the estimator lives
/// here so deployments can override it from a config file or environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Seconds between the starts of consecutive rounds
    pub round_interval_secs: u64,
    /// Per-round bound on waiting for worker replies (milliseconds)
    pub response_timeout_ms: u64,
    /// Rounds slower than this are logged; they are never aborted
    pub round_soft_deadline_ms: u64,
    /// Worker directory cache lifetime (seconds)
    pub cache_ttl_secs: u64,
    /// Ground-truth samples to collect before switching to production.
    /// Zero disables training entirely.
    pub training_sample_target: u64,
    /// Minimum valid replies before the participation penalty applies
    pub min_valid_responses: usize,
    /// Scale applied to all scores when participation is too low
    pub participation_penalty: f64,
    /// Multiplier on the estimator's optimality probability in production
    pub production_bonus_multiplier: f64,
    /// Decay rate of the ground-truth distance score
    pub ground_truth_decay: f64,
    /// Seed for challenge generation (None = OS entropy)
    pub challenge_seed: Option<u64>,
    /// Checkpoint location for the estimator (None = no persistence)
    pub model_path: Option<PathBuf>,
    pub estimator: EstimatorConfig,
    pub commitment: CommitmentConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            round_interval_secs: 10,
            response_timeout_ms: 5_000,
            round_soft_deadline_ms: 12_000,
            cache_ttl_secs: 60,
            training_sample_target: 10_000,
            min_valid_responses: 1,
            participation_penalty: 0.5,
            production_bonus_multiplier: 1.2,
            ground_truth_decay: 1.0,
            challenge_seed: None,
            model_path: None,
            estimator: EstimatorConfig::default(),
            commitment: CommitmentConfig::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn round_interval(&self) -> Duration {
        Duration::from_secs(self.round_interval_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn round_soft_deadline(&self) -> Duration {
        Duration::from_millis(self.round_soft_deadline_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.round_interval_secs == 0 {
            return Err(invalid("round_interval_secs must be positive"));
        }
        if self.response_timeout_ms == 0 {
            return Err(invalid("response_timeout_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.participation_penalty) {
            return Err(invalid("participation_penalty must be in [0, 1]"));
        }
        let bonus = self.production_bonus_multiplier;
        if !(bonus.is_finite() && bonus >= 0.0) {
            return Err(invalid("production_bonus_multiplier must be non-negative"));
        }
        if !(self.ground_truth_decay.is_finite() && self.ground_truth_decay > 0.0) {
            return Err(invalid("ground_truth_decay must be positive"));
        }
        self.estimator.validate()
    }
}

/// Output scale constants shared by training targets and de-normalisation.
///
/// The estimator's bounded outputs are multiplied by these to recover domain
/// units; training targets are divided by the same values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorScales {
    pub price_scale: f64,
    pub quantity_scale: f64,
}

impl Default for EstimatorScales {
    fn default() -> Self {
        Self {
            price_scale: 3.0,
            quantity_scale: 500.0,
        }
    }
}

/// Estimate returned while the model is still untrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralEstimate {
    pub optimality_probability: f64,
    pub utility: f64,
    pub price: f64,
    pub quantity: f64,
}

impl Default for NeutralEstimate {
    fn default() -> Self {
        Self {
            optimality_probability: 0.5,
            utility: 0.5,
            price: 1.5,
            quantity: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub hidden_dim: usize,
    pub dropout: f32,
    pub learning_rate: f32,
    /// Seed for weight init and dropout masks (None = OS entropy)
    pub seed: Option<u64>,
    pub scales: EstimatorScales,
    pub neutral: NeutralEstimate,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            dropout: 0.2,
            learning_rate: 0.001,
            seed: None,
            scales: EstimatorScales::default(),
            neutral: NeutralEstimate::default(),
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_dim < 2 {
            return Err(invalid("estimator.hidden_dim must be at least 2"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(invalid("estimator.dropout must be in [0, 1)"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("estimator.learning_rate must be positive"));
        }
        if !(self.scales.price_scale > 0.0 && self.scales.quantity_scale > 0.0) {
            return Err(invalid("estimator scales must be positive"));
        }
        if !(0.0..=1.0).contains(&self.neutral.optimality_probability) {
            return Err(invalid("neutral optimality_probability must be in [0, 1]"));
        }
        Ok(())
    }
}

/// How buyer/seller role flags are produced when building a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RoleFlagPolicy {
    /// Flags are a pure function of the intent; extraction is deterministic.
    #[default]
    IntentDerived,
    /// Flags are random draws from a seeded generator (reproducible runs).
    Seeded { seed: u64 },
    /// Flags are random draws from OS entropy.
    Entropy,
}

/// Contextual constants written into every party slot of a commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitmentConfig {
    pub role_flags: RoleFlagPolicy,
    pub latency: f32,
    pub region_code: f32,
    pub time_horizon: f32,
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        Self {
            role_flags: RoleFlagPolicy::IntentDerived,
            latency: 0.5,
            region_code: 0.0,
            time_horizon: 0.5,
        }
    }
}

fn invalid(reason: &str) -> ValidatorError {
    ValidatorError::InvalidConfig(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ValidatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.estimator.scales.price_scale, 3.0);
        assert_eq!(config.estimator.scales.quantity_scale, 500.0);
    }

    #[test]
    fn test_rejects_out_of_range_penalty() {
        let config = ValidatorConfig {
            participation_penalty: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_estimator_settings() {
        let mut config = ValidatorConfig::default();
        config.estimator.dropout = 1.0;
        assert!(config.validate().is_err());

        let mut config = ValidatorConfig::default();
        config.estimator.scales.quantity_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "training_sample_target": 25,
            "commitment": { "role_flags": { "policy": "seeded", "seed": 9 } }
        }"#;
        let config: ValidatorConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.training_sample_target, 25);
        assert_eq!(config.round_interval_secs, 10);
        assert_eq!(
            config.commitment.role_flags,
            RoleFlagPolicy::Seeded { seed: 9 }
        );
        assert_eq!(config.commitment.latency, 0.5);
    }
}

use crate::config::{EstimatorConfig, EstimatorScales, NeutralEstimate};
use crate::error::{Result, ValidatorError};
use nash_nn::{Layer, NnError, Sequential};
use nash_protocol::COMMITMENT_DIM;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Width of the estimator output: probability, utility, price, quantity.
pub const ESTIMATE_DIM: usize = 4;

/// Build the commitment model: three hidden blocks with normalisation and
/// dropout, and a sigmoid head so every output lies in `[0, 1]`.
pub fn build_commitment_model<R: Rng + ?Sized>(
    config: &EstimatorConfig,
    rng: &mut R,
) -> Result<Sequential> {
    let hidden = config.hidden_dim;
    let model = Sequential::builder(COMMITMENT_DIM)
        .linear(hidden, rng)
        .relu()
        .layer_norm()
        .dropout(config.dropout)
        .linear(hidden, rng)
        .relu()
        .layer_norm()
        .dropout(config.dropout)
        .linear(hidden, rng)
        .relu()
        .linear(ESTIMATE_DIM, rng)
        .sigmoid()
        .build()?;
    Ok(model)
}

/// Check a loaded network against the estimator's contract.
pub fn ensure_compatible(model: &Sequential) -> Result<()> {
    model.validate()?;
    if model.input_dim() != COMMITMENT_DIM {
        return Err(ValidatorError::IncompatibleModel(format!(
            "input width {} (expected {})",
            model.input_dim(),
            COMMITMENT_DIM
        )));
    }
    if model.output_dim() != ESTIMATE_DIM {
        return Err(ValidatorError::IncompatibleModel(format!(
            "output width {} (expected {})",
            model.output_dim(),
            ESTIMATE_DIM
        )));
    }
    if !matches!(model.layers().last(), Some(Layer::Sigmoid)) {
        return Err(ValidatorError::IncompatibleModel(
            "output layer is not a sigmoid".to_string(),
        ));
    }
    Ok(())
}

/// Estimated quality of the optimal settlement for a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub optimality_probability: f64,
    pub utility: f64,
    pub price: f64,
    pub quantity: f64,
}

impl Estimate {
    /// De-normalise a raw model output.
    pub fn from_output(output: &[f32], scales: &EstimatorScales) -> Result<Self> {
        if output.len() != ESTIMATE_DIM {
            return Err(NnError::DimensionMismatch {
                context: "estimate output",
                expected: ESTIMATE_DIM,
                actual: output.len(),
            }
            .into());
        }
        if output.iter().any(|v| !v.is_finite()) {
            return Err(NnError::NonFinite("estimate output").into());
        }
        Ok(Self {
            optimality_probability: f64::from(output[0]),
            utility: f64::from(output[1]),
            price: f64::from(output[2]) * scales.price_scale,
            quantity: f64::from(output[3]) * scales.quantity_scale,
        })
    }

    pub fn neutral(neutral: &NeutralEstimate) -> Self {
        Self {
            optimality_probability: neutral.optimality_probability,
            utility: neutral.utility,
            price: neutral.price,
            quantity: neutral.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_model_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = build_commitment_model(&EstimatorConfig::default(), &mut rng).unwrap();
        ensure_compatible(&model).unwrap();

        let output = model.forward(&[0.5; COMMITMENT_DIM]).unwrap();
        assert_eq!(output.len(), ESTIMATE_DIM);
        assert!(output.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rejects_foreign_architecture() {
        let mut rng = StdRng::seed_from_u64(3);
        let wrong_input = Sequential::builder(16)
            .linear(ESTIMATE_DIM, &mut rng)
            .sigmoid()
            .build()
            .unwrap();
        assert!(matches!(
            ensure_compatible(&wrong_input),
            Err(ValidatorError::IncompatibleModel(_))
        ));

        let unbounded = Sequential::builder(COMMITMENT_DIM)
            .linear(ESTIMATE_DIM, &mut rng)
            .build()
            .unwrap();
        assert!(ensure_compatible(&unbounded).is_err());
    }

    #[test]
    fn test_denormalisation() {
        let estimate =
            Estimate::from_output(&[0.8, 0.4, 0.5, 0.25], &EstimatorScales::default()).unwrap();
        assert!((estimate.optimality_probability - 0.8).abs() < 1e-6);
        assert!((estimate.price - 1.5).abs() < 1e-6);
        assert!((estimate.quantity - 125.0).abs() < 1e-4);

        assert!(Estimate::from_output(&[0.1, 0.2], &EstimatorScales::default()).is_err());
    }
}

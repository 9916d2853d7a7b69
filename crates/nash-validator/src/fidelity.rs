use crate::error::Result;
use crate::response::ValidatedResponse;
use nash_nn::Sequential;
use nash_protocol::{Intent, INTENT_DIM, POINT_DIM};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Leading representation values fed to the scorer; shorter
/// representations are zero-padded so the point always lands at the end.
pub const REPRESENTATION_WINDOW: usize = 256;
pub const FIDELITY_INPUT_DIM: usize = INTENT_DIM + REPRESENTATION_WINDOW + POINT_DIM;

/// Learned fidelity proxy used when no ground truth is available.
///
/// Maps `intent ++ representation window ++ point` to a score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct FidelityScorer {
    model: Sequential,
}

impl FidelityScorer {
    pub fn new(seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let model = Sequential::builder(FIDELITY_INPUT_DIM)
            .linear(64, &mut rng)
            .relu()
            .linear(32, &mut rng)
            .relu()
            .linear(1, &mut rng)
            .sigmoid()
            .build()?;
        Ok(Self { model })
    }

    pub fn features(intent: &Intent, response: &ValidatedResponse<'_>) -> Vec<f32> {
        let mut features = Vec::with_capacity(FIDELITY_INPUT_DIM);
        features.extend_from_slice(intent.as_slice());
        let window = response.representation.len().min(REPRESENTATION_WINDOW);
        features.extend_from_slice(&response.representation[..window]);
        features.resize(INTENT_DIM + REPRESENTATION_WINDOW, 0.0);
        features.extend_from_slice(&response.point);
        features
    }

    pub fn score(&self, intent: &Intent, response: &ValidatedResponse<'_>) -> Result<f64> {
        let output = self.model.forward(&Self::features(intent, response))?;
        Ok(output.first().copied().map(f64::from).unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_pad_short_representations() {
        let response = ValidatedResponse {
            representation: &[1.0, 2.0, 3.0],
            point: [7.0, 8.0],
        };
        let features = FidelityScorer::features(&Intent::zeros(), &response);

        assert_eq!(features.len(), FIDELITY_INPUT_DIM);
        assert_eq!(&features[INTENT_DIM..INTENT_DIM + 3], &[1.0, 2.0, 3.0]);
        assert_eq!(features[INTENT_DIM + 3], 0.0);
        assert_eq!(&features[FIDELITY_INPUT_DIM - 2..], &[7.0, 8.0]);
    }

    #[test]
    fn test_features_truncate_long_representations() {
        let long = vec![0.5; 1024];
        let response = ValidatedResponse {
            representation: &long,
            point: [1.0, 2.0],
        };
        let features = FidelityScorer::features(&Intent::zeros(), &response);
        assert_eq!(features.len(), FIDELITY_INPUT_DIM);
        assert_eq!(&features[FIDELITY_INPUT_DIM - 2..], &[1.0, 2.0]);
    }

    #[test]
    fn test_score_is_bounded_and_deterministic() {
        let scorer = FidelityScorer::new(Some(4)).unwrap();
        let response = ValidatedResponse {
            representation: &[0.3; 256],
            point: [1.2, 180.0],
        };
        let a = scorer.score(&Intent::zeros(), &response).unwrap();
        let b = scorer.score(&Intent::zeros(), &response).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
    }
}

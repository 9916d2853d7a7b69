use crate::config::ValidatorConfig;
use serde::Serialize;
use tracing::{debug, warn};

/// Normalised per-worker weights for one round, in worker order.
///
/// Every entry is non-negative; the entries either sum to one or are all zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreVector(Vec<f64>);

impl ScoreVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|w| *w == 0.0)
    }

    pub fn non_zero_count(&self) -> usize {
        self.0.iter().filter(|w| **w > 0.0).count()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Turns raw per-worker scores into a [`ScoreVector`].
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    min_valid_responses: usize,
    participation_penalty: f64,
}

impl ScoreAggregator {
    pub fn new(min_valid_responses: usize, participation_penalty: f64) -> Self {
        Self {
            min_valid_responses,
            participation_penalty,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.min_valid_responses, config.participation_penalty)
    }

    pub fn aggregate(
        &self,
        raw_scores: &[f64],
        valid_count: usize,
        total_count: usize,
    ) -> ScoreVector {
        if raw_scores.len() != total_count {
            warn!(
                scores = raw_scores.len(),
                total = total_count,
                "⚠️ Score count differs from worker count"
            );
        }

        let mut scores: Vec<f64> = raw_scores
            .iter()
            .map(|s| if s.is_finite() { s.max(0.0) } else { 0.0 })
            .collect();

        if valid_count < self.min_valid_responses {
            debug!(
                valid = valid_count,
                minimum = self.min_valid_responses,
                penalty = self.participation_penalty,
                "Low participation, scaling scores"
            );
            for s in &mut scores {
                *s *= self.participation_penalty;
            }
        }

        // Scale by the maximum first so large finite scores cannot overflow the sum.
        let max = scores.iter().copied().fold(0.0f64, f64::max);
        if max > 0.0 {
            for s in &mut scores {
                *s /= max;
            }
            let sum: f64 = scores.iter().sum();
            for s in &mut scores {
                *s /= sum;
            }
        }

        ScoreVector(scores)
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::from_config(&ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalises_positive_scores() {
        let weights = ScoreAggregator::default().aggregate(&[0.2, 0.0, 0.6], 2, 3);
        assert!((weights.sum() - 1.0).abs() < 1e-12);
        assert!((weights.as_slice()[0] - 0.25).abs() < 1e-12);
        assert!((weights.as_slice()[2] - 0.75).abs() < 1e-12);
        assert_eq!(weights.non_zero_count(), 2);
    }

    #[test]
    fn test_negative_and_non_finite_are_zeroed() {
        let weights =
            ScoreAggregator::default().aggregate(&[-3.0, f64::NAN, f64::INFINITY, 1.0], 4, 4);
        assert_eq!(weights.as_slice(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_all_zero_stays_zero() {
        let weights = ScoreAggregator::default().aggregate(&[0.0, -1.0], 0, 2);
        assert!(weights.is_all_zero());
        assert!(weights.as_slice().iter().all(|w| !w.is_nan()));
    }

    #[test]
    fn test_penalty_applies_below_minimum() {
        // The penalty scales every entry uniformly, so the normalised shape is
        // unchanged while the pre-normalisation mass drops.
        let aggregator = ScoreAggregator::new(3, 0.5);
        let weights = aggregator.aggregate(&[0.4, 0.4], 2, 2);
        assert_eq!(weights.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_huge_scores_do_not_overflow() {
        let weights = ScoreAggregator::default().aggregate(&[f64::MAX, f64::MAX], 2, 2);
        assert_eq!(weights.as_slice(), &[0.5, 0.5]);
    }

    proptest! {
        #[test]
        fn prop_weights_are_non_negative_and_normalised(
            raw in prop::collection::vec(prop_oneof![
                -1e6f64..1e6,
                Just(0.0),
                Just(f64::NAN),
                Just(f64::NEG_INFINITY),
            ], 0..64),
            valid in 0usize..8,
        ) {
            let weights = ScoreAggregator::default().aggregate(&raw, valid, raw.len());
            prop_assert_eq!(weights.len(), raw.len());
            prop_assert!(weights.as_slice().iter().all(|w| *w >= 0.0 && w.is_finite()));
            prop_assert!(weights.is_all_zero() || (weights.sum() - 1.0).abs() < 1e-9);
        }
    }
}

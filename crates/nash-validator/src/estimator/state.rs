use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoring branch used by the validation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Ground truth (or the fidelity proxy) scores workers; the estimator learns.
    Training,
    /// Only the trained estimator's judgement is used.
    Production,
}

impl Mode {
    /// Numeric encoding exported on the mode gauge.
    pub fn as_gauge(&self) -> i64 {
        match self {
            Mode::Training => 0,
            Mode::Production => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Training => write!(f, "training"),
            Mode::Production => write!(f, "production"),
        }
    }
}

/// Progress of the estimator's online training.
///
/// `mode` leaves `Training` at most once and `model_ready` never returns to
/// false; `samples_collected` only grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    pub mode: Mode,
    pub samples_collected: u64,
    pub model_ready: bool,
}

impl TrainingState {
    /// Initial state for a freshly initialised model. A zero target means the
    /// model is never trained: scoring goes straight to the production branch
    /// and falls back to the neutral estimate.
    pub fn fresh(sample_target: u64) -> Self {
        let mode = if sample_target == 0 {
            Mode::Production
        } else {
            Mode::Training
        };
        Self {
            mode,
            samples_collected: 0,
            model_ready: false,
        }
    }

    /// State for a model restored from a checkpoint.
    pub fn restored(samples_collected: u64) -> Self {
        Self {
            mode: Mode::Production,
            samples_collected,
            model_ready: true,
        }
    }

    pub(crate) fn complete(&mut self) {
        self.mode = Mode::Production;
        self.model_ready = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state() {
        let state = TrainingState::fresh(10);
        assert_eq!(state.mode, Mode::Training);
        assert!(!state.model_ready);

        let never_train = TrainingState::fresh(0);
        assert_eq!(never_train.mode, Mode::Production);
        assert!(!never_train.model_ready);
    }

    #[test]
    fn test_complete_sets_mode_and_readiness() {
        let mut state = TrainingState::fresh(3);
        state.samples_collected = 3;
        state.complete();
        assert_eq!(state, TrainingState::restored(3));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Training.to_string(), "training");
        assert_eq!(Mode::Production.as_gauge(), 1);
    }
}

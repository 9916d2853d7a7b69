use crate::error::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Validator round metrics, registered on a private registry.
#[derive(Clone)]
pub struct ValidatorMetrics {
    registry: Arc<Registry>,
    pub rounds_completed: IntCounter,
    pub rounds_aborted: IntCounter,

    // Per-reply outcomes
    pub responses_valid: IntCounter,
    pub responses_invalid: IntCounter,
    pub responses_timed_out: IntCounter,

    // Estimator
    pub estimator_failures: IntCounter,
    pub training_samples: IntGauge,
    pub mode: IntGauge, // 0=training, 1=production

    pub publish_failures: IntCounter,
    pub round_duration: Histogram,
}

impl ValidatorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let rounds_completed =
            IntCounter::new("nash_rounds_completed_total", "Validation rounds completed")?;
        let rounds_aborted =
            IntCounter::new("nash_rounds_aborted_total", "Validation rounds aborted")?;

        let responses_valid = IntCounter::new(
            "nash_responses_valid_total",
            "Worker responses that passed validation",
        )?;
        let responses_invalid = IntCounter::new(
            "nash_responses_invalid_total",
            "Worker responses rejected as malformed or failed",
        )?;
        let responses_timed_out = IntCounter::new(
            "nash_responses_timed_out_total",
            "Workers that did not answer within the round timeout",
        )?;

        let estimator_failures = IntCounter::new(
            "nash_estimator_failures_total",
            "Estimator inference or training errors downgraded to neutral results",
        )?;
        let training_samples = IntGauge::new(
            "nash_training_samples_collected",
            "Ground-truth samples the estimator has trained on",
        )?;
        let mode = IntGauge::new("nash_validator_mode", "Scoring mode (0=training, 1=production)")?;

        let publish_failures =
            IntCounter::new("nash_publish_failures_total", "Weight publications that failed")?;
        let round_duration = Histogram::with_opts(
            HistogramOpts::new("nash_round_duration_seconds", "Validation round duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        )?;

        registry.register(Box::new(rounds_completed.clone()))?;
        registry.register(Box::new(rounds_aborted.clone()))?;
        registry.register(Box::new(responses_valid.clone()))?;
        registry.register(Box::new(responses_invalid.clone()))?;
        registry.register(Box::new(responses_timed_out.clone()))?;
        registry.register(Box::new(estimator_failures.clone()))?;
        registry.register(Box::new(training_samples.clone()))?;
        registry.register(Box::new(mode.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(round_duration.clone()))?;

        Ok(Self {
            registry,
            rounds_completed,
            rounds_aborted,
            responses_valid,
            responses_invalid,
            responses_timed_out,
            estimator_failures,
            training_samples,
            mode,
            publish_failures,
            round_duration,
        })
    }

    /// Text exposition of every registered metric.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_gather() {
        let m = ValidatorMetrics::new().unwrap();
        m.rounds_completed.inc();
        m.responses_timed_out.inc_by(3);
        m.mode.set(1);

        let text = m.gather();
        assert!(text.contains("nash_rounds_completed_total 1"));
        assert!(text.contains("nash_responses_timed_out_total 3"));
        assert!(text.contains("nash_validator_mode 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ValidatorMetrics::new().unwrap();
        let b = ValidatorMetrics::new().unwrap();
        a.rounds_aborted.inc();
        assert!(b.gather().contains("nash_rounds_aborted_total 0"));
    }
}

use async_trait::async_trait;
use nash_protocol::Intent;
use nash_validator::{EstimatorScales, GroundTruthOracle, OptimalSettlement, Result, ValidatorError};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct SolveRequest<'a> {
    intent: &'a [f32],
}

/// JSON-over-HTTP ground-truth solver.
///
/// `POST {url}/solve` with `{"intent": [...]}`; the body is an
/// `OptimalSettlement`, or `null` / `204 No Content` when the solver has no
/// answer for this intent.
#[derive(Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn solve_url(&self) -> String {
        format!("{}/solve", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl GroundTruthOracle for HttpOracle {
    async fn solve(&self, intent: &Intent) -> Result<Option<OptimalSettlement>> {
        let response = self
            .client
            .post(self.solve_url())
            .json(&SolveRequest {
                intent: intent.as_slice(),
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ValidatorError::Oracle(e.to_string()))?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        response
            .json::<Option<OptimalSettlement>>()
            .await
            .map_err(|e| ValidatorError::Oracle(e.to_string()))
    }
}

/// Closed-form stand-in for an external solver, used by `nash simulate`.
///
/// Price and quantity are the first two intent coordinates squashed into
/// `[0, price_scale]` and `[0, quantity_scale]`. A settlement is Pareto
/// optimal when the intent has both a buyer and a seller side.
pub struct SyntheticOracle {
    scales: EstimatorScales,
}

impl SyntheticOracle {
    pub fn new(scales: EstimatorScales) -> Self {
        Self { scales }
    }

    pub fn settle(&self, intent: &Intent) -> OptimalSettlement {
        let squash = |v: f32| 1.0 / (1.0 + (-f64::from(v)).exp());
        let values = intent.as_slice();
        OptimalSettlement {
            price: self.scales.price_scale * squash(values[0]),
            quantity: self.scales.quantity_scale * squash(values[1]),
            utility: squash(values[4]),
            pareto_optimal: values[2] >= 0.0 && values[3] >= 0.0,
        }
    }
}

#[async_trait]
impl GroundTruthOracle for SyntheticOracle {
    async fn solve(&self, intent: &Intent) -> Result<Option<OptimalSettlement>> {
        Ok(Some(self.settle(intent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nash_protocol::INTENT_DIM;

    #[test]
    fn test_synthetic_settlement_stays_in_scale() {
        let oracle = SyntheticOracle::new(EstimatorScales::default());

        let mut values = [0.0; INTENT_DIM];
        let neutral = oracle.settle(&Intent::new(values));
        assert_eq!(neutral.price, 1.5);
        assert_eq!(neutral.quantity, 250.0);
        assert!(neutral.pareto_optimal);

        values[0] = 40.0;
        values[1] = -40.0;
        values[3] = -1.0;
        let extreme = oracle.settle(&Intent::new(values));
        assert!(extreme.price <= 3.0 && extreme.price > 2.99);
        assert!(extreme.quantity >= 0.0 && extreme.quantity < 0.01);
        assert!(!extreme.pareto_optimal);
    }

    #[test]
    fn test_solve_url() {
        let oracle = HttpOracle::new("http://solver:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(oracle.solve_url(), "http://solver:9000/solve");
    }
}

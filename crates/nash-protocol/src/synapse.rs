use crate::error::{ProtocolError, Result};
use crate::types::{Intent, POINT_DIM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Challenge sent from a validator to every worker in a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// Requirement vector (price, latency, reliability, ...).
    pub raw_intent: Option<Vec<f32>>,
    /// Free-form metadata such as hardware class or region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl ChallengeRequest {
    pub fn from_intent(intent: &Intent) -> Self {
        Self {
            raw_intent: Some(intent.as_slice().to_vec()),
            context: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Request-side sanity check performed by workers before inference.
    pub fn validate(&self) -> Result<&[f32]> {
        let intent = self
            .raw_intent
            .as_deref()
            .ok_or(ProtocolError::MissingField("raw_intent"))?;
        if intent.is_empty() {
            return Err(ProtocolError::EmptyField("raw_intent"));
        }
        if intent.iter().any(|v| !v.is_finite()) {
            return Err(ProtocolError::NonFinite("raw_intent"));
        }
        Ok(intent)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// A worker's proposed settlement.
///
/// Both fields are optional on the wire: a worker that failed to solve the
/// challenge answers with an empty response rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Compressed representation of the settlement manifold.
    #[serde(default, alias = "manifold_tensor")]
    pub representation: Option<Vec<f32>>,
    /// Proposed `(x, y)` equilibrium coordinates.
    #[serde(default, alias = "equilibrium_point")]
    pub point: Option<Vec<f32>>,
}

impl WorkerResponse {
    pub fn new(representation: Vec<f32>, point: Vec<f32>) -> Self {
        Self {
            representation: Some(representation),
            point: Some(point),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.representation.is_none() && self.point.is_none()
    }

    /// Split into `(representation, point)`, rejecting missing fields or a
    /// point that is not exactly two values. Finiteness is left to the
    /// validator's response check.
    pub fn into_parts(self) -> Result<(Vec<f32>, [f32; POINT_DIM])> {
        let representation = self
            .representation
            .ok_or(ProtocolError::MissingField("representation"))?;
        let point = self.point.ok_or(ProtocolError::MissingField("point"))?;

        if representation.is_empty() {
            return Err(ProtocolError::EmptyField("representation"));
        }
        let point: [f32; POINT_DIM] =
            point
                .as_slice()
                .try_into()
                .map_err(|_| ProtocolError::DimensionMismatch {
                    field: "point",
                    expected: POINT_DIM,
                    actual: point.len(),
                })?;

        Ok((representation, point))
    }
}

impl fmt::Display for WorkerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = |field: &Option<Vec<f32>>| match field {
            Some(values) => format!("[{}]", values.len()),
            None => "None".to_string(),
        };
        write!(
            f,
            "WorkerResponse(representation: {}, point: {})",
            shape(&self.representation),
            shape(&self.point)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert_eq!(
            ChallengeRequest::default().validate(),
            Err(ProtocolError::MissingField("raw_intent"))
        );

        let empty = ChallengeRequest {
            raw_intent: Some(vec![]),
            context: None,
        };
        assert_eq!(empty.validate(), Err(ProtocolError::EmptyField("raw_intent")));

        let nan = ChallengeRequest {
            raw_intent: Some(vec![1.0, f32::NAN]),
            context: None,
        };
        assert!(!nan.is_valid());

        let ok = ChallengeRequest::from_intent(&Intent::zeros()).with_context("region", "us-east");
        assert!(ok.is_valid());
        assert_eq!(ok.context.unwrap().get("region").unwrap(), "us-east");
    }

    #[test]
    fn test_response_into_parts() {
        let (repr, point) = WorkerResponse::new(vec![0.1, 0.2], vec![1.5, 300.0])
            .into_parts()
            .unwrap();
        assert_eq!(repr, vec![0.1, 0.2]);
        assert_eq!(point, [1.5, 300.0]);

        assert_eq!(
            WorkerResponse::new(vec![0.1], vec![1.0, 2.0, 3.0]).into_parts(),
            Err(ProtocolError::DimensionMismatch {
                field: "point",
                expected: POINT_DIM,
                actual: 3,
            })
        );
        assert_eq!(
            WorkerResponse::empty().into_parts(),
            Err(ProtocolError::MissingField("representation"))
        );
    }

    #[test]
    fn test_response_accepts_legacy_field_names() {
        let json = r#"{"manifold_tensor":[0.5,0.25],"equilibrium_point":[1.0,2.0]}"#;
        let response: WorkerResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.representation, Some(vec![0.5, 0.25]));
        assert_eq!(response.point, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_response_display_shows_shapes() {
        let response = WorkerResponse {
            representation: Some(vec![0.0; 256]),
            point: None,
        };
        assert_eq!(
            response.to_string(),
            "WorkerResponse(representation: [256], point: None)"
        );
    }
}

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a raw intent vector.
pub const INTENT_DIM: usize = 10;
/// Width of the commitment view derived from an intent.
pub const COMMITMENT_DIM: usize = 32;
/// Arity of a proposed equilibrium point `(x, y)`.
pub const POINT_DIM: usize = 2;

/// Full-information description of a requested transaction.
///
/// Coordinate 0 is price and coordinate 1 is quantity; the remaining
/// coordinates carry latency, reliability and other requirements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent([f32; INTENT_DIM]);

impl Intent {
    pub const PRICE: usize = 0;
    pub const QUANTITY: usize = 1;

    pub fn new(values: [f32; INTENT_DIM]) -> Self {
        Self(values)
    }

    pub fn zeros() -> Self {
        Self([0.0; INTENT_DIM])
    }

    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let array: [f32; INTENT_DIM] =
            values
                .try_into()
                .map_err(|_| ProtocolError::DimensionMismatch {
                    field: "intent",
                    expected: INTENT_DIM,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }

    pub fn price(&self) -> f32 {
        self.0[Self::PRICE]
    }

    pub fn quantity(&self) -> f32 {
        self.0[Self::QUANTITY]
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Lossy, partial-information projection of an [`Intent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Commitment([f32; COMMITMENT_DIM]);

impl Commitment {
    pub fn new(values: [f32; COMMITMENT_DIM]) -> Self {
        Self(values)
    }

    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let array: [f32; COMMITMENT_DIM] =
            values
                .try_into()
                .map_err(|_| ProtocolError::DimensionMismatch {
                    field: "commitment",
                    expected: COMMITMENT_DIM,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        COMMITMENT_DIM
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Addressable worker as published by the membership source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub uid: u32,
    pub address: String,
}

impl WorkerHandle {
    pub fn new(uid: u32, address: impl Into<String>) -> Self {
        Self {
            uid,
            address: address.into(),
        }
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.uid, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_accessors() {
        let mut values = [0.0; INTENT_DIM];
        values[0] = 1.75;
        values[1] = -320.0;
        let intent = Intent::new(values);

        assert_eq!(intent.price(), 1.75);
        assert_eq!(intent.quantity(), -320.0);
        assert_eq!(intent.get(INTENT_DIM), None);
        assert!(intent.is_finite());
    }

    #[test]
    fn test_intent_from_slice_checks_width() {
        assert!(Intent::from_slice(&[0.0; INTENT_DIM]).is_ok());
        assert_eq!(
            Intent::from_slice(&[0.0; 3]),
            Err(ProtocolError::DimensionMismatch {
                field: "intent",
                expected: INTENT_DIM,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_commitment_width_is_fixed() {
        assert!(Commitment::from_slice(&[0.0; 31]).is_err());
        let commitment = Commitment::from_slice(&[0.5; COMMITMENT_DIM]).unwrap();
        assert_eq!(commitment.len(), COMMITMENT_DIM);
        assert_eq!(commitment.as_slice().len(), COMMITMENT_DIM);
    }

    #[test]
    fn test_worker_handle_display() {
        let handle = WorkerHandle::new(7, "http://10.0.0.7:8091");
        assert_eq!(handle.to_string(), "7@http://10.0.0.7:8091");
    }
}

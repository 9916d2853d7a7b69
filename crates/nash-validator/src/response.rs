use nash_protocol::{WorkerResponse, POINT_DIM};
use std::fmt;

/// Why a worker response was judged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingRepresentation,
    MissingPoint,
    EmptyRepresentation,
    PointArity(usize),
    NonFinite(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingRepresentation => write!(f, "representation missing"),
            Rejection::MissingPoint => write!(f, "point missing"),
            Rejection::EmptyRepresentation => write!(f, "representation empty"),
            Rejection::PointArity(n) => {
                write!(f, "point has {} elements, expected {}", n, POINT_DIM)
            }
            Rejection::NonFinite(field) => write!(f, "{} contains NaN or infinity", field),
        }
    }
}

/// A response that passed every structural and numeric check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedResponse<'a> {
    pub representation: &'a [f32],
    pub point: [f32; POINT_DIM],
}

/// Stateless structural/numeric check applied to every worker reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn check<'a>(
        &self,
        response: &'a WorkerResponse,
    ) -> Result<ValidatedResponse<'a>, Rejection> {
        let representation = response
            .representation
            .as_deref()
            .ok_or(Rejection::MissingRepresentation)?;
        let point = response.point.as_deref().ok_or(Rejection::MissingPoint)?;

        if representation.is_empty() {
            return Err(Rejection::EmptyRepresentation);
        }
        let point: [f32; POINT_DIM] = point
            .try_into()
            .map_err(|_| Rejection::PointArity(point.len()))?;
        if representation.iter().any(|v| !v.is_finite()) {
            return Err(Rejection::NonFinite("representation"));
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(Rejection::NonFinite("point"));
        }

        Ok(ValidatedResponse {
            representation,
            point,
        })
    }

    pub fn validate(&self, response: &WorkerResponse) -> bool {
        self.check(response).is_ok()
    }
}

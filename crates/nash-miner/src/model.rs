use crate::error::Result;
use nash_nn::Sequential;
use nash_protocol::{INTENT_DIM, POINT_DIM};
use rand::Rng;

/// Width of the settlement representation produced by the encoder.
pub const REPRESENTATION_DIM: usize = 256;

/// Maps a raw intent to its settlement representation.
#[derive(Debug, Clone)]
pub struct IntentEncoder {
    network: Sequential,
}

impl IntentEncoder {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        let network = Sequential::builder(INTENT_DIM)
            .linear(64, rng)
            .relu()
            .linear(128, rng)
            .relu()
            .linear(REPRESENTATION_DIM, rng)
            .build()?;
        Ok(Self { network })
    }

    pub fn encode(&self, intent: &[f32]) -> Result<Vec<f32>> {
        Ok(self.network.forward(intent)?)
    }

    pub fn parameter_count(&self) -> usize {
        self.network.parameter_count()
    }
}

/// Maps a representation to a proposed `(x, y)` equilibrium.
#[derive(Debug, Clone)]
pub struct EquilibriumSolver {
    network: Sequential,
}

impl EquilibriumSolver {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        let network = Sequential::builder(REPRESENTATION_DIM)
            .linear(128, rng)
            .relu()
            .linear(64, rng)
            .relu()
            .linear(POINT_DIM, rng)
            .build()?;
        Ok(Self { network })
    }

    pub fn solve(&self, representation: &[f32]) -> Result<Vec<f32>> {
        Ok(self.network.forward(representation)?)
    }

    pub fn parameter_count(&self) -> usize {
        self.network.parameter_count()
    }
}

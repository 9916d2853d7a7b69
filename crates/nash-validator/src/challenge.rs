use nash_protocol::Intent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Synthetic intent source: every coordinate is an independent standard
/// normal draw.
pub struct ChallengeGenerator {
    rng: StdRng,
    slot: Intent,
}

impl ChallengeGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            slot: Intent::zeros(),
        }
    }

    /// Generate one intent into the reusable output slot.
    pub fn generate(&mut self) -> &Intent {
        for value in self.slot.as_mut_slice() {
            *value = self.rng.sample(StandardNormal);
        }
        &self.slot
    }

    /// Generate `count` independent intents from the same distribution.
    pub fn generate_batch(&mut self, count: usize) -> Vec<Intent> {
        (0..count).map(|_| *self.generate()).collect()
    }
}

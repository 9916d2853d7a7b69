use crate::config::{CommitmentConfig, RoleFlagPolicy};
use nash_protocol::{Commitment, Intent, COMMITMENT_DIM};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of party slots replicated in a commitment.
pub const PARTY_COUNT: usize = 4;
/// Features written per party slot.
pub const FEATURES_PER_PARTY: usize = COMMITMENT_DIM / PARTY_COUNT;

// Intent coordinates consulted by the intent-derived role flags.
const BUYER_SIGNAL: usize = 2;
const SELLER_SIGNAL: usize = 3;

/// Buyer/seller/deferrer indicators for one extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleFlags {
    pub buyer: f32,
    pub seller: f32,
    pub deferrer: f32,
}

/// Projects a full [`Intent`] into the partial [`Commitment`] view.
///
/// Each party slot is laid out as
/// `[price, |quantity|, latency, region, buyer, seller, deferrer, horizon]`.
/// Role flags are resolved once per call and shared by every slot.
pub struct CommitmentExtractor {
    config: CommitmentConfig,
    rng: Option<StdRng>,
}

impl CommitmentExtractor {
    pub fn new(config: CommitmentConfig) -> Self {
        let rng = match config.role_flags {
            RoleFlagPolicy::IntentDerived => None,
            RoleFlagPolicy::Seeded { seed } => Some(StdRng::seed_from_u64(seed)),
            RoleFlagPolicy::Entropy => Some(StdRng::from_entropy()),
        };
        Self { config, rng }
    }

    pub fn policy(&self) -> RoleFlagPolicy {
        self.config.role_flags
    }

    /// Derive the commitment for `intent`. Output width is always
    /// [`COMMITMENT_DIM`].
    pub fn extract(&mut self, intent: &Intent) -> Commitment {
        let flags = self.role_flags(intent);
        let party = [
            intent.price(),
            intent.quantity().abs(),
            self.config.latency,
            self.config.region_code,
            flags.buyer,
            flags.seller,
            flags.deferrer,
            self.config.time_horizon,
        ];

        let mut values = [0.0f32; COMMITMENT_DIM];
        for slot in values.chunks_exact_mut(FEATURES_PER_PARTY) {
            slot.copy_from_slice(&party);
        }
        Commitment::new(values)
    }

    fn role_flags(&mut self, intent: &Intent) -> RoleFlags {
        let indicator = |on: bool| if on { 1.0 } else { 0.0 };
        match self.rng.as_mut() {
            Some(rng) => RoleFlags {
                buyer: indicator(rng.gen_bool(0.5)),
                seller: indicator(rng.gen_bool(0.5)),
                deferrer: 0.0,
            },
            None => RoleFlags {
                buyer: indicator(intent.get(BUYER_SIGNAL).unwrap_or(0.0) >= 0.0),
                seller: indicator(intent.get(SELLER_SIGNAL).unwrap_or(0.0) >= 0.0),
                deferrer: 0.0,
            },
        }
    }
}

impl Default for CommitmentExtractor {
    fn default() -> Self {
        Self::new(CommitmentConfig::default())
    }
}

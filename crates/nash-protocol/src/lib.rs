//! Wire envelope for NASH settlement challenges.
//!
//! Validators send a [`ChallengeRequest`] carrying a raw intent; workers answer
//! with a [`WorkerResponse`] holding a compressed representation and a proposed
//! equilibrium point. Fixed-width vectors ([`Intent`], [`Commitment`]) are
//! shared here so both sides agree on their layout.

pub mod error;
pub mod synapse;
pub mod types;

pub use error::{ProtocolError, Result};
pub use synapse::{ChallengeRequest, WorkerResponse};
pub use types::{Commitment, Intent, WorkerHandle, COMMITMENT_DIM, INTENT_DIM, POINT_DIM};

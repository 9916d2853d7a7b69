//! Reference NASH worker.
//!
//! Encodes a raw intent into a 256-wide settlement representation and solves
//! it for an `(x, y)` equilibrium point. Served over HTTP as
//! `POST /challenge`.

pub mod error;
pub mod miner;
pub mod model;
pub mod service;

pub use error::{MinerError, Result};
pub use miner::{MinerConfig, ModelInfo, SettlementMiner};
pub use model::{EquilibriumSolver, IntentEncoder, REPRESENTATION_DIM};
pub use service::{router, serve};

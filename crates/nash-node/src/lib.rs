//! NASH node: wires the validator pipeline to HTTP workers, weight sinks and
//! operator endpoints, and hosts the reference miner.

pub mod config;
pub mod http;
pub mod logging;
pub mod membership;
pub mod node;
pub mod oracle;
pub mod simulate;
pub mod sink;
pub mod status;

pub use config::{LoggingConfig, NetworkConfig, NodeConfig, SinkKind, WeightsConfig};
pub use http::HttpWorkerClient;
pub use membership::{parse_worker, parse_worker_list, FileMembership, StaticMembership};
pub use oracle::{HttpOracle, SyntheticOracle};
pub use sink::{JsonlWeightSink, LogWeightSink, WeightRecord};

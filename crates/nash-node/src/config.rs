use anyhow::{Context, Result};
use nash_miner::MinerConfig;
use nash_protocol::WorkerHandle;
use nash_validator::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::membership::parse_worker_list;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "nash-config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub validator: ValidatorConfig,
    pub miner: MinerConfig,
    pub network: NetworkConfig,
    pub weights: WeightsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Static worker list; ignored when `membership_file` is set
    pub workers: Vec<WorkerHandle>,
    /// JSON array of `{uid, address}` re-read on every directory refresh
    pub membership_file: Option<PathBuf>,
    pub miner_listen: String,
    /// Serve validator metrics at `GET /metrics` on this address
    pub metrics_listen: Option<String>,
    /// Ground-truth solver base URL; without it training scores fall back to
    /// the fidelity proxy and the estimator never trains
    pub oracle_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            membership_file: None,
            miner_listen: "0.0.0.0:8091".to_string(),
            metrics_listen: None,
            oracle_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Log each round's weights
    Log,
    /// Append one JSON line per round to `output`
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub sink: SinkKind,
    pub output: PathBuf,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Log,
            output: PathBuf::from("./weights.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// pretty, compact or json
    pub format: String,
    pub file_output: Option<PathBuf>,
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// `path` if given, else `./nash-config.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Apply `NASH_*` environment overrides. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let v = &mut self.validator;
        if let Some(secs) = env_parse("NASH_ROUND_INTERVAL_SECS") {
            v.round_interval_secs = secs;
        }
        if let Some(ms) = env_parse("NASH_RESPONSE_TIMEOUT_MS") {
            v.response_timeout_ms = ms;
        }
        if let Some(secs) = env_parse("NASH_CACHE_TTL_SECS") {
            v.cache_ttl_secs = secs;
        }
        if let Some(target) = env_parse("NASH_TRAINING_SAMPLE_TARGET") {
            v.training_sample_target = target;
        }
        if let Some(min) = env_parse("NASH_MIN_VALID_RESPONSES") {
            v.min_valid_responses = min;
        }
        if let Some(penalty) = env_parse("NASH_PARTICIPATION_PENALTY") {
            v.participation_penalty = penalty;
        }
        if let Some(scale) = env_parse("NASH_PRICE_SCALE") {
            v.estimator.scales.price_scale = scale;
        }
        if let Some(scale) = env_parse("NASH_QUANTITY_SCALE") {
            v.estimator.scales.quantity_scale = scale;
        }
        if let Ok(path) = env::var("NASH_MODEL_PATH") {
            if !path.is_empty() {
                v.model_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(workers) = env::var("NASH_WORKERS") {
            if let Ok(parsed) = parse_worker_list(&workers) {
                self.network.workers = parsed;
            }
        }
        if let Ok(path) = env::var("NASH_MEMBERSHIP_FILE") {
            if !path.is_empty() {
                self.network.membership_file = Some(PathBuf::from(path));
            }
        }
        if let Ok(url) = env::var("NASH_ORACLE_URL") {
            if !url.is_empty() {
                self.network.oracle_url = Some(url);
            }
        }
        if let Ok(listen) = env::var("NASH_MINER_LISTEN") {
            if !listen.is_empty() {
                self.network.miner_listen = listen;
            }
        }
        if let Ok(output) = env::var("NASH_WEIGHTS_OUTPUT") {
            if !output.is_empty() {
                self.weights.sink = SinkKind::Jsonl;
                self.weights.output = PathBuf::from(output);
            }
        }
        if let Ok(level) = env::var("NASH_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

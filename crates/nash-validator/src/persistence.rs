use crate::error::{Result, ValidatorError};
use crate::estimator::TrainingState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nash_nn::Sequential;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Checkpoint layout version understood by this build.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Everything needed to resume scoring with a trained estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub format_version: u32,
    pub model: Sequential,
    pub state: TrainingState,
    pub saved_at: DateTime<Utc>,
}

impl ModelCheckpoint {
    pub fn new(model: Sequential, state: TrainingState) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            model,
            state,
            saved_at: Utc::now(),
        }
    }
}

/// Single load/save point for estimator parameters.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Returns `Ok(None)` when no checkpoint exists yet.
    async fn load(&self) -> Result<Option<ModelCheckpoint>>;

    async fn save(&self, checkpoint: &ModelCheckpoint) -> Result<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// JSON checkpoint on the local filesystem.
///
/// Saves write a sibling temporary file first and rename it into place so a
/// crash mid-write never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn load(&self) -> Result<Option<ModelCheckpoint>> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "No checkpoint on disk");
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let checkpoint: ModelCheckpoint = serde_json::from_str(&contents)?;
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(ValidatorError::Persistence(format!(
                "unsupported checkpoint format {} (expected {})",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }

        info!(
            path = %self.path.display(),
            samples = checkpoint.state.samples_collected,
            saved_at = %checkpoint.saved_at,
            "📦 Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &ModelCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string(checkpoint)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        info!(
            path = %self.path.display(),
            samples = checkpoint.state.samples_collected,
            "💾 Checkpoint saved"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

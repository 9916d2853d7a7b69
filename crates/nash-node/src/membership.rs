use anyhow::{anyhow, Context};
use async_trait::async_trait;
use nash_protocol::WorkerHandle;
use nash_validator::{MembershipSource, Result, ValidatorError};
use std::path::PathBuf;

/// Parse `uid@address`.
pub fn parse_worker(entry: &str) -> anyhow::Result<WorkerHandle> {
    let (uid, address) = entry
        .trim()
        .split_once('@')
        .ok_or_else(|| anyhow!("expected uid@address, got {:?}", entry))?;
    let uid = uid
        .trim()
        .parse()
        .with_context(|| format!("invalid worker uid {:?}", uid))?;
    let address = address.trim();
    if address.is_empty() {
        return Err(anyhow!("worker {} has an empty address", uid));
    }
    Ok(WorkerHandle::new(uid, address))
}

/// Parse a comma-separated list of `uid@address` entries.
pub fn parse_worker_list(list: &str) -> anyhow::Result<Vec<WorkerHandle>> {
    list.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(parse_worker)
        .collect()
}

/// Fixed worker set from configuration.
pub struct StaticMembership {
    workers: Vec<WorkerHandle>,
}

impl StaticMembership {
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl MembershipSource for StaticMembership {
    async fn list_workers(&self) -> Result<Vec<WorkerHandle>> {
        Ok(self.workers.clone())
    }
}

/// Worker set read from a JSON file on every refresh.
pub struct FileMembership {
    path: PathBuf,
}

impl FileMembership {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MembershipSource for FileMembership {
    async fn list_workers(&self) -> Result<Vec<WorkerHandle>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ValidatorError::Membership(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ValidatorError::Membership(format!("{}: {}", self.path.display(), e))
        })
    }
}

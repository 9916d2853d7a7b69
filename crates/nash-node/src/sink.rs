use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nash_validator::{Result, ValidatorError, WeightSink};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Logs each round's weights.
#[derive(Default)]
pub struct LogWeightSink;

#[async_trait]
impl WeightSink for LogWeightSink {
    async fn publish(&self, worker_ids: &[u32], weights: &[f64]) -> Result<()> {
        if worker_ids.len() != weights.len() {
            return Err(ValidatorError::Publish(format!(
                "{} ids for {} weights",
                worker_ids.len(),
                weights.len()
            )));
        }
        let pairs: Vec<String> = worker_ids
            .iter()
            .zip(weights)
            .map(|(uid, w)| format!("{}={:.4}", uid, w))
            .collect();
        info!(workers = worker_ids.len(), weights = %pairs.join(" "), "📦 Weights published");
        Ok(())
    }
}

/// One line of a JSONL weights file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub timestamp: DateTime<Utc>,
    pub worker_ids: Vec<u32>,
    pub weights: Vec<f64>,
}

/// Appends one JSON record per round to a file.
pub struct JsonlWeightSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlWeightSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl WeightSink for JsonlWeightSink {
    async fn publish(&self, worker_ids: &[u32], weights: &[f64]) -> Result<()> {
        let record = WeightRecord {
            timestamp: Utc::now(),
            worker_ids: worker_ids.to_vec(),
            weights: weights.to_vec(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ValidatorError::Publish(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ValidatorError::Publish(format!("{}: {}", self.path.display(), e)))?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_jsonl_sink_appends_records() {
        let dir = tempdir().unwrap();
        let sink = JsonlWeightSink::new(dir.path().join("out/weights.jsonl"));

        sink.publish(&[0, 1], &[0.25, 0.75]).await.unwrap();
        sink.publish(&[0, 1], &[1.0, 0.0]).await.unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let records: Vec<WeightRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].weights, vec![0.25, 0.75]);
        assert_eq!(records[1].worker_ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_log_sink_rejects_mismatched_lengths() {
        let sink = LogWeightSink;
        assert!(sink.publish(&[1, 2], &[1.0]).await.is_err());
        assert!(sink.publish(&[1], &[1.0]).await.is_ok());
    }
}

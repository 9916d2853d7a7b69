use async_trait::async_trait;
use nash_protocol::{ChallengeRequest, WorkerHandle, WorkerResponse};
use nash_validator::{Result, ValidatorError, WorkerClient};
use std::time::Duration;

/// JSON-over-HTTP client for workers serving `POST /challenge`.
///
/// The round deadline is enforced by the fan-out transport; only the connect
/// timeout is bounded here.
#[derive(Clone)]
pub struct HttpWorkerClient {
    client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    fn challenge_url(address: &str) -> String {
        format!("{}/challenge", address.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn query(
        &self,
        worker: &WorkerHandle,
        request: &ChallengeRequest,
    ) -> Result<WorkerResponse> {
        let response = self
            .client
            .post(Self::challenge_url(&worker.address))
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ValidatorError::Transport(format!("worker {}: {}", worker, e)))?;

        response
            .json::<WorkerResponse>()
            .await
            .map_err(|e| ValidatorError::Transport(format!("worker {}: {}", worker, e)))
    }
}

use crate::error::Result;
use crate::interfaces::{WorkerClient, WorkerReply, WorkerTransport};
use async_trait::async_trait;
use futures_util::future::join_all;
use nash_protocol::{ChallengeRequest, WorkerHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Broadcast built from a point-to-point client.
///
/// Every worker is queried concurrently, each bounded by the same timeout, so
/// the broadcast completes when the slowest worker answers or the timeout
/// elapses. Replies come back in worker order.
pub struct FanOutTransport<C> {
    client: Arc<C>,
}

impl<C: WorkerClient> FanOutTransport<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_arc(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

#[async_trait]
impl<C: WorkerClient + 'static> WorkerTransport for FanOutTransport<C> {
    async fn broadcast(
        &self,
        request: &ChallengeRequest,
        workers: &[WorkerHandle],
        timeout: Duration,
    ) -> Result<Vec<WorkerReply>> {
        let client = &self.client;
        let queries = workers.iter().map(|worker| async move {
            match tokio::time::timeout(timeout, client.query(worker, request)).await {
                Ok(Ok(response)) => WorkerReply::Responded(response),
                Ok(Err(e)) => {
                    debug!(worker = %worker, error = %e, "Worker query failed");
                    WorkerReply::Failed(e.to_string())
                }
                Err(_) => {
                    debug!(
                        worker = %worker,
                        timeout_ms = timeout.as_millis() as u64,
                        "Worker timed out"
                    );
                    WorkerReply::TimedOut
                }
            }
        });
        Ok(join_all(queries).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidatorError;
    use nash_protocol::{Intent, WorkerResponse};

    /// Worker `uid` answers after `uid * 100ms`; uid 9 always errors.
    struct StaggeredClient;

    #[async_trait]
    impl WorkerClient for StaggeredClient {
        async fn query(
            &self,
            worker: &WorkerHandle,
            _request: &ChallengeRequest,
        ) -> Result<WorkerResponse> {
            if worker.uid == 9 {
                return Err(ValidatorError::Transport("connection refused".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(100 * u64::from(worker.uid))).await;
            Ok(WorkerResponse::new(vec![worker.uid as f32], vec![1.0, 2.0]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_keep_worker_order() {
        let transport = FanOutTransport::new(StaggeredClient);
        let workers = vec![
            WorkerHandle::new(3, "w3"),
            WorkerHandle::new(1, "w1"),
            WorkerHandle::new(9, "w9"),
            WorkerHandle::new(60, "w60"),
        ];
        let request = ChallengeRequest::from_intent(&Intent::zeros());

        let started = tokio::time::Instant::now();
        let replies = transport
            .broadcast(&request, &workers, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(replies.len(), 4);
        assert_eq!(
            replies[0],
            WorkerReply::Responded(WorkerResponse::new(vec![3.0], vec![1.0, 2.0]))
        );
        assert_eq!(
            replies[1],
            WorkerReply::Responded(WorkerResponse::new(vec![1.0], vec![1.0, 2.0]))
        );
        assert!(matches!(replies[2], WorkerReply::Failed(_)));
        assert_eq!(replies[3], WorkerReply::TimedOut);
        assert!(started.elapsed() <= Duration::from_millis(5_001));
    }

    #[tokio::test]
    async fn test_empty_worker_list() {
        let transport = FanOutTransport::new(StaggeredClient);
        let request = ChallengeRequest::from_intent(&Intent::zeros());
        let replies = transport
            .broadcast(&request, &[], Duration::from_secs(1))
            .await
            .unwrap();
        assert!(replies.is_empty());
    }
}

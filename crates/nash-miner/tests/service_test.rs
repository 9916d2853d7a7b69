use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use nash_miner::{router, MinerConfig, ModelInfo, SettlementMiner};
use nash_protocol::{ChallengeRequest, Intent, WorkerResponse};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> axum::Router {
    let miner = SettlementMiner::new(MinerConfig {
        seed: Some(8),
        ..Default::default()
    })
    .unwrap();
    router(Arc::new(miner))
}

fn post_json(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/challenge")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn read_response(response: axum::response::Response) -> WorkerResponse {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_challenge_round_trip() {
    let request =
        ChallengeRequest::from_intent(&Intent::new([0.2; 10])).with_context("region", "eu");
    let response = app()
        .oneshot(post_json(serde_json::to_string(&request).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = read_response(response).await;
    let (representation, point) = reply.into_parts().unwrap();
    assert_eq!(representation.len(), 256);
    assert!(point.iter().all(|v| v.is_finite()));
}

#[tokio::test]
async fn test_challenge_without_intent_gets_empty_reply() {
    let response = app().oneshot(post_json("{}".to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_response(response).await.is_empty());
}

#[tokio::test]
async fn test_info_reports_parameter_counts() {
    let response = app()
        .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let info: ModelInfo = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(info.representation_dim, 256);
}

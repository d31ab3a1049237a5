//! Failure injection tests: a slow, broken or missing controller and an
//! unreachable counter store.

use std::time::Duration;

use httpmock::{Method::GET, Method::POST, MockServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

async fn provision(relay: &common::RunningRelay, hostname: &str) -> (StatusCode, Value) {
    let res = common::client()
        .post(relay.url("/provision"))
        .json(&json!({ "hostname": hostname }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_controller_timeout() {
    let controller = MockServer::start_async().await;
    controller
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/job_templates/");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"results": [{"id": 1}]}));
        })
        .await;

    let mut config = common::relay_config(&controller.base_url());
    config.controller.timeout_secs = 1;
    let relay = common::start_relay(config).await;

    let (status, body) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Controller API timeout after 1 seconds");
}

#[tokio::test]
async fn test_controller_launch_rejected() {
    let controller = MockServer::start_async().await;
    common::mock_template_lookup(&controller, 3).await;
    controller
        .mock_async(|when, then| {
            when.method(POST).path("/api/v2/job_templates/3/launch/");
            then.status(503).body("maintenance");
        })
        .await;

    let relay = common::start_relay(common::relay_config(&controller.base_url())).await;

    let (status, body) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["hostname"], "web-1");
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("503"), "unexpected error: {}", error);
}

#[tokio::test]
async fn test_controller_unreachable() {
    // Nothing listens on port 1.
    let relay = common::start_relay(common::relay_config("http://127.0.0.1:1")).await;

    let (status, body) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Controller API error"));
}

#[tokio::test]
async fn test_failed_launch_still_counts_against_quota() {
    let controller = MockServer::start_async().await;
    let lookup = controller
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/job_templates/");
            then.status(500);
        })
        .await;

    let mut config = common::relay_config(&controller.base_url());
    config.rate_limit.per_client = "1 per 5 minutes".parse().unwrap();
    let relay = common::start_relay(config).await;

    let (status, _) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded");

    lookup.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_unreachable_store_falls_back_to_memory() {
    let controller = MockServer::start_async().await;
    common::mock_template_lookup(&controller, 1).await;
    let launch = common::mock_template_launch(&controller, 1, 77).await;

    let mut config = common::relay_config(&controller.base_url());
    config.rate_limit.store_url = Some("redis://127.0.0.1:1".into());
    config.rate_limit.store_connect_timeout_secs = 1;
    config.rate_limit.per_client = "1 per 5 minutes".parse().unwrap();
    let relay = common::start_relay(config).await;

    let (status, body) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], 77);

    // The in-process counters still enforce the quota.
    let (status, _) = provision(&relay, "web-1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    launch.assert_hits_async(1).await;
}

//! Shared utilities for integration and load testing.

use std::net::SocketAddr;

use httpmock::{Method::GET, Method::POST, Mock, MockServer};
use provision_relay::config::RelayConfig;
use provision_relay::http::HttpServer;
use provision_relay::lifecycle::{self, Shutdown};
use serde_json::json;
use tokio::net::TcpListener;

/// A relay serving on an ephemeral local port. Stops when dropped.
pub struct RunningRelay {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Prepare and start a relay with `config`.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let prepared = lifecycle::prepare(config).await.expect("relay config should be valid");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(prepared.config, prepared.launcher, prepared.limiter);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningRelay { addr, shutdown }
}

/// A template-mode configuration pointing at `controller_url`.
pub fn relay_config(controller_url: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.controller.base_url = Some(controller_url.to_string());
    config.controller.token = Some("test-token".into());
    config.controller.template_name = Some("provision-host".into());
    config.controller.timeout_secs = 2;
    config.rate_limit.per_client = "100 per minute".parse().unwrap();
    config.rate_limit.global = "1000 per hour".parse().unwrap();
    config
}

/// HTTP client that never reuses connections between requests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Mock the template lookup answering with template `id`.
#[allow(dead_code)]
pub async fn mock_template_lookup(server: &MockServer, id: u64) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/job_templates/")
                .query_param("name", "provision-host");
            then.status(200)
                .json_body(json!({"count": 1, "results": [{"id": id, "name": "provision-host"}]}));
        })
        .await
}

/// Mock a successful launch of template `id` returning job `job_id`.
#[allow(dead_code)]
pub async fn mock_template_launch(server: &MockServer, id: u64, job_id: u64) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/api/v2/job_templates/{}/launch/", id));
            then.status(201).json_body(json!({"job": job_id, "id": job_id}));
        })
        .await
}

//! Automation controller client with timeout and error handling.
//!
//! # Responsibilities
//! - Resolve the configured job template or workflow by name
//! - Launch it with the inventory limited to a single hostname
//! - Bound every outbound call with a timeout
//! - Fold every failure into a `JobLaunchResult`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::config::{ControllerAuth, ControllerConfig, LaunchTarget};
use crate::controller::types::{
    ControllerError, ControllerResult, ExtraVars, JobLaunchResult, LaunchPayload, LaunchResponse,
    NamedCollection,
};
use crate::observability::metrics;
use crate::security::hostname::Hostname;

/// Error bodies are cut to this many characters before being reported.
const MAX_ERROR_BODY: usize = 200;

/// Launches one job per hostname.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch_job(&self, hostname: &Hostname) -> JobLaunchResult;
}

/// REST client for the controller's `/api/v2` endpoints.
#[derive(Clone)]
pub struct ControllerClient {
    http: Client,
    api_root: String,
    auth: ControllerAuth,
    target: LaunchTarget,
    timeout_secs: u64,
}

impl ControllerClient {
    /// Build a client from configuration. Fails if the base URL, credentials or
    /// launch target are unusable.
    pub fn new(config: &ControllerConfig) -> ControllerResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| ControllerError::Transport("controller base URL is not configured".into()))?;
        let auth = config
            .auth()
            .ok_or_else(|| ControllerError::Transport("controller credentials are not configured".into()))?;
        let target = config.target().ok_or_else(|| {
            ControllerError::Transport("exactly one of template or workflow name is required".into())
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("provision-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ControllerError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_root: format!("{}/api/v2", base_url.trim_end_matches('/')),
            auth,
            target,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn target(&self) -> &LaunchTarget {
        &self.target
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/", self.api_root, self.target.collection())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ControllerAuth::Bearer(token) => request.bearer_auth(token),
            ControllerAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    /// Send a request and decode a JSON success body, all within the timeout.
    async fn call<T: DeserializeOwned>(&self, step: &'static str, request: RequestBuilder) -> ControllerResult<T> {
        let start = Instant::now();
        let deadline = Duration::from_secs(self.timeout_secs);

        let result = match timeout(deadline, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(ControllerError::Timeout(self.timeout_secs)),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_timeout() => "timeout",
            Err(_) => "error",
        };
        metrics::record_controller_call(step, outcome, start);

        result
    }

    async fn exchange<T: DeserializeOwned>(&self, request: RequestBuilder) -> ControllerResult<T> {
        let response = self.authorize(request).send().await.map_err(self.map_reqwest())?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ControllerError::Timeout(self.timeout_secs)
                } else {
                    ControllerError::Decode(e.to_string())
                }
            })
    }

    fn map_reqwest(&self) -> impl Fn(reqwest::Error) -> ControllerError + '_ {
        move |e| {
            if e.is_timeout() {
                ControllerError::Timeout(self.timeout_secs)
            } else {
                ControllerError::Transport(e.to_string())
            }
        }
    }

    /// Look up the id of the configured template or workflow.
    pub async fn resolve(&self) -> ControllerResult<u64> {
        let request = self
            .http
            .get(self.collection_url())
            .query(&[("name", self.target.name())]);

        let collection: NamedCollection = self.call("resolve", request).await?;
        collection
            .results
            .first()
            .map(|resource| resource.id)
            .ok_or_else(|| ControllerError::NotFound {
                kind: self.target.label(),
                name: self.target.name().to_string(),
            })
    }

    /// Launch resource `id` limited to `hostname`. Returns the new job's id.
    pub async fn launch(&self, id: u64, hostname: &Hostname) -> ControllerResult<Option<u64>> {
        let payload = LaunchPayload {
            limit: hostname.as_str(),
            extra_vars: ExtraVars {
                target_hostname: hostname.as_str(),
            },
        };
        let request = self
            .http
            .post(format!("{}{}/launch/", self.collection_url(), id))
            .json(&payload);

        let response: LaunchResponse = self.call("launch", request).await?;
        Ok(response.job_id())
    }
}

#[async_trait]
impl JobLauncher for ControllerClient {
    async fn launch_job(&self, hostname: &Hostname) -> JobLaunchResult {
        let kind = self.target.label();
        let name = self.target.name();

        let id = match self.resolve().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(kind, name, hostname = %hostname, error = %e, "Failed to resolve launch target");
                return JobLaunchResult::failure(e.to_string());
            }
        };

        match self.launch(id, hostname).await {
            Ok(job_id) => {
                tracing::info!(kind, resource_id = id, hostname = %hostname, job_id = ?job_id, "Launched job");
                JobLaunchResult::Success {
                    job_id,
                    job_type: self.target.job_type(),
                    hostname: hostname.clone(),
                }
            }
            Err(e) => {
                tracing::error!(kind, resource_id = id, hostname = %hostname, error = %e, "Failed to launch job");
                JobLaunchResult::failure(e.to_string())
            }
        }
    }
}

/// Stands in for the controller when a development start had no usable
/// controller configuration.
pub struct UnconfiguredLauncher {
    reason: String,
}

impl UnconfiguredLauncher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl JobLauncher for UnconfiguredLauncher {
    async fn launch_job(&self, hostname: &Hostname) -> JobLaunchResult {
        tracing::error!(hostname = %hostname, reason = %self.reason, "Launch requested but controller is not configured");
        JobLaunchResult::failure(format!("Controller not configured: {}", self.reason))
    }
}

async fn check_status(response: Response) -> ControllerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ControllerError::Status {
        status: status.as_u16(),
        body: truncate(body.trim(), MAX_ERROR_BODY),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

//! Controller wire types, launch results and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LaunchTarget;
use crate::security::hostname::Hostname;

/// Kind of job that was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Template,
    Workflow,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Template => "template",
            JobType::Workflow => "workflow",
        }
    }
}

impl LaunchTarget {
    pub fn job_type(&self) -> JobType {
        match self {
            LaunchTarget::Template(_) => JobType::Template,
            LaunchTarget::Workflow(_) => JobType::Workflow,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LaunchTarget::Template(name) | LaunchTarget::Workflow(name) => name,
        }
    }

    /// Collection endpoint under `/api/v2/`.
    pub fn collection(&self) -> &'static str {
        match self {
            LaunchTarget::Template(_) => "job_templates",
            LaunchTarget::Workflow(_) => "workflow_job_templates",
        }
    }

    /// Human-readable kind, used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            LaunchTarget::Template(_) => "Template",
            LaunchTarget::Workflow(_) => "Workflow",
        }
    }
}

/// Outcome of a launch attempt, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLaunchResult {
    Success {
        job_id: Option<u64>,
        job_type: JobType,
        hostname: Hostname,
    },
    Failure {
        error: String,
    },
}

impl JobLaunchResult {
    pub fn failure(error: impl Into<String>) -> Self {
        JobLaunchResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobLaunchResult::Success { .. })
    }
}

/// Errors that can occur while talking to the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The named template or workflow does not exist.
    #[error("{kind} not found")]
    NotFound { kind: &'static str, name: String },

    /// An outbound call exceeded its deadline.
    #[error("Controller API timeout after {0} seconds")]
    Timeout(u64),

    /// Connection or protocol failure.
    #[error("Controller API error: {0}")]
    Transport(String),

    /// The controller answered with a non-success status.
    #[error("Controller API error: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Controller API error: unexpected response: {0}")]
    Decode(String),
}

impl ControllerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ControllerError::Timeout(_))
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// One page of a named-resource collection.
#[derive(Debug, Deserialize)]
pub(crate) struct NamedCollection {
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamedResource {
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct LaunchPayload<'a> {
    pub limit: &'a str,
    pub extra_vars: ExtraVars<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExtraVars<'a> {
    pub target_hostname: &'a str,
}

/// Launch responses carry the new job's id under `id`; older controllers
/// only send `job` or `workflow_job`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LaunchResponse {
    pub id: Option<u64>,
    pub job: Option<u64>,
    pub workflow_job: Option<u64>,
}

impl LaunchResponse {
    pub fn job_id(&self) -> Option<u64> {
        self.id.or(self.job).or(self.workflow_job)
    }
}

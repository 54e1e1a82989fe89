//! Generation job models.
//!
//! A job tracks one unit of externally-hosted background work (video or
//! image generation, or the final compose). Its `status` is the local
//! lifecycle, distinct from whatever state enum the provider reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::project::ProjectId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque run reference handed out by the generation provider.
///
/// Absence on a job means "not yet submitted". This is the only key a
/// webhook delivery carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunRef(pub String);

impl RunRef {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "video-gen")]
    VideoGen,
    #[serde(rename = "image-gen")]
    ImageGen,
    #[serde(rename = "compose")]
    Compose,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::VideoGen => "video-gen",
            JobKind::ImageGen => "image-gen",
            JobKind::Compose => "compose",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet submitted to the provider
    #[default]
    Queued,
    /// Submitted, awaiting a completion signal
    Running,
    /// Provider reported success and outputs were recorded
    Success,
    /// Failed (may still be retried via a fresh submission)
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (must never be mutated again).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    /// Check if this counts toward in-flight progress.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A background work item owned by a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,

    pub project_id: ProjectId,

    pub kind: JobKind,

    #[serde(default)]
    pub status: JobStatus,

    /// Provider run reference; `None` means not yet submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_ref: Option<RunRef>,

    /// Durable output URLs, set on success.
    #[serde(default)]
    pub output_urls: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Number of (re)submission/failure cycles consumed so far.
    #[serde(default)]
    pub retries: u32,

    /// Fingerprint of the last applied failure signal, used to tell a
    /// replayed failure delivery apart from some other late signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued video-generation job.
    pub fn new_video_gen(project_id: ProjectId) -> Self {
        Self::new(project_id, JobKind::VideoGen)
    }

    /// Create a new queued image-generation job.
    pub fn new_image_gen(project_id: ProjectId) -> Self {
        Self::new(project_id, JobKind::ImageGen)
    }

    /// Create a new queued compose job.
    pub fn new_compose(project_id: ProjectId) -> Self {
        Self::new(project_id, JobKind::Compose)
    }

    fn new(project_id: ProjectId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            project_id,
            kind,
            status: JobStatus::Queued,
            run_ref: None,
            output_urls: Vec::new(),
            cost: None,
            duration_ms: None,
            error_message: None,
            retries: 0,
            last_failure_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a fresh job continuing a failed predecessor's retry chain.
    ///
    /// A job whose provider run failed is never resubmitted under the same
    /// run; a replacement job takes over, carrying the chain's consumed
    /// retry count so the cap stays bounded across replacements.
    pub fn replacement_for(failed: &Job) -> Self {
        let mut job = Self::new(failed.project_id.clone(), failed.kind);
        job.retries = failed.retries;
        job
    }

    /// Record a successful provider submission.
    pub fn start(&mut self, run_ref: RunRef) {
        self.run_ref = Some(run_ref);
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Record terminal success with outputs.
    pub fn succeed(&mut self, output_urls: Vec<String>, cost: Option<f64>, duration_ms: Option<i64>) {
        self.status = JobStatus::Success;
        self.output_urls = output_urls;
        self.cost = cost;
        self.duration_ms = duration_ms;
        self.updated_at = Utc::now();
    }

    /// Record a failure cycle: bump `retries` and remember the error.
    ///
    /// The job stays eligible for a fresh submission until the caller's
    /// retry cap says otherwise.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = Some(error.into());
        self.retries += 1;
        self.updated_at = Utc::now();
    }

    /// Check if no further mutation is allowed.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check whether the job may be (re)submitted under the given cap.
    pub fn can_retry(&self, cap: u32) -> bool {
        self.retries < cap
    }

    /// Check whether a running job has outlived `stale_after` without a
    /// terminal signal and should be force-failed.
    pub fn is_stale(&self, stale_after: chrono::Duration) -> bool {
        if self.is_terminal() || self.run_ref.is_none() {
            return false;
        }
        Utc::now() - self.updated_at > stale_after
    }
}

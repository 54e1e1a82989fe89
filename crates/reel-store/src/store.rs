//! Store traits for projects and jobs.
//!
//! Both traits describe a keyed record store with per-record conditional
//! writes. The engine holds them as trait objects so tests can substitute
//! in-memory doubles.

use async_trait::async_trait;

use reel_models::{Job, JobId, JobKind, Project, ProjectId, RunRef};

use crate::error::StoreResult;

/// Guarded mutation passed to [`JobStore::update_job_if`].
///
/// Returns `true` to apply the mutation, `false` to leave the record
/// untouched. The store evaluates it atomically with respect to other
/// writers of the same record.
pub type JobMutation<'a> = &'a (dyn Fn(&mut Job) -> bool + Send + Sync);

/// Outcome of a conditional job update.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// The guard accepted; the stored record after mutation.
    Applied(Job),
    /// The guard declined; the record as currently stored.
    Skipped(Job),
}

impl JobUpdate {
    /// The job as stored after the call, whichever branch was taken.
    pub fn into_job(self) -> Job {
        match self {
            JobUpdate::Applied(job) | JobUpdate::Skipped(job) => job,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, JobUpdate::Applied(_))
    }
}

/// Keyed store of project records.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fetch a project by ID.
    async fn get_project(&self, id: &ProjectId) -> StoreResult<Option<Project>>;

    /// Insert a new project; fails if the ID already exists.
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;

    /// Replace the stored project (last write wins).
    async fn update_project(&self, project: &Project) -> StoreResult<()>;

    /// Delete the project record. Missing record is not an error.
    async fn delete_project(&self, id: &ProjectId) -> StoreResult<()>;
}

/// Keyed store of job records, independently addressable by run reference
/// (the only entry point webhooks have).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job by ID.
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Insert a new job; fails if the ID already exists.
    async fn insert_job(&self, job: &Job) -> StoreResult<()>;

    /// Replace the stored job (last write wins).
    async fn update_job(&self, job: &Job) -> StoreResult<()>;

    /// Conditionally mutate a job under the store's record lock.
    ///
    /// This is the terminal-state race guard: the guard closure observes
    /// the current record and decides whether to apply, so "mark terminal
    /// unless already terminal" is a single atomic step per record.
    async fn update_job_if(&self, id: &JobId, apply: JobMutation<'_>) -> StoreResult<JobUpdate>;

    /// Look a job up by its provider run reference.
    async fn find_by_run_ref(&self, run_ref: &RunRef) -> StoreResult<Option<Job>>;

    /// All jobs of a project, optionally filtered by kind, in creation
    /// order (the positional-correlation ordering).
    async fn list_jobs(
        &self,
        project_id: &ProjectId,
        kind: Option<JobKind>,
    ) -> StoreResult<Vec<Job>>;

    /// Delete every job owned by the project.
    async fn delete_jobs_for_project(&self, project_id: &ProjectId) -> StoreResult<()>;
}

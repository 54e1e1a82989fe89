//! The reconciliation pass.
//!
//! One pass runs per status poll and per webhook delivery. Each pass
//! re-reads all state, force-fails silently dropped runs, pulls fresh
//! provider status for in-flight jobs, applies completions, spends at most
//! one retry submission, and projects derived progress.

use metrics::counter;
use tracing::{debug, warn};

use reel_models::{Job, JobId, Project, ProjectId, ProjectStatus, RenderProgress, RunRef};
use reel_provider::{ProviderError, ProviderOutput, ProviderState, RunSnapshot, RunTiming};

use crate::completion::CompletionOutcome;
use crate::engine::ReconcileEngine;
use crate::error::EngineResult;
use crate::progress::compute_progress;

/// Snapshot of a project after one reconciliation pass.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub project: Project,
    pub progress: RenderProgress,
    /// Video-gen jobs in creation order, as of the end of the pass.
    pub jobs: Vec<Job>,
    /// Jobs whose completion could not be matched to any scene.
    pub divergent_jobs: Vec<JobId>,
}

impl ReconcileOutcome {
    /// Human-readable failure reason, when the project is failed: the most
    /// recently updated job error.
    pub fn failure_reason(&self) -> Option<&str> {
        if self.project.status != ProjectStatus::Error {
            return None;
        }
        self.jobs
            .iter()
            .filter(|j| j.error_message.is_some())
            .max_by_key(|j| j.updated_at)
            .and_then(|j| j.error_message.as_deref())
    }
}

impl ReconcileEngine {
    /// Run one reconciliation pass over a project.
    ///
    /// Terminal projects are projected without touching the provider. A
    /// pass over N in-flight jobs issues at most N provider polls plus one
    /// retry submission; transient poll errors leave the job for the next
    /// pass rather than failing it.
    pub async fn reconcile(&self, project_id: &ProjectId) -> EngineResult<ReconcileOutcome> {
        let project = self.load_project(project_id).await?;

        if project.status.is_terminal() {
            let jobs = self.video_jobs(project_id).await?;
            let progress = compute_progress(&project, &jobs);
            return Ok(ReconcileOutcome {
                project,
                progress,
                jobs,
                divergent_jobs: Vec::new(),
            });
        }

        let mut divergent_jobs = Vec::new();

        // 1. Staleness sweep: a run reference with no terminal signal for
        //    too long means the provider dropped the run; without this the
        //    job would hang forever, because a live run_ref blocks
        //    resubmission.
        let jobs = self.video_jobs(project_id).await?;
        for job in &jobs {
            if job.is_stale(self.config.stale_after()) {
                warn!(job_id = %job.id, "job exceeded staleness threshold, force-failing");
                counter!("reel_jobs_stale_total").increment(1);
                let run_ref = job.run_ref.clone().unwrap_or_else(|| RunRef::from(""));
                let snapshot = synthetic_failure(run_ref, "generation timed out");
                self.apply_failure(job.clone(), &snapshot, "generation timed out")
                    .await?;
            }
        }

        // 2. Poll every job still awaiting a signal.
        let jobs = self.video_jobs(project_id).await?;
        for job in &jobs {
            let Some(run_ref) = job.run_ref.as_ref() else {
                continue;
            };
            if job.is_terminal() {
                continue;
            }
            match self.provider.poll(run_ref).await {
                Ok(snapshot) => {
                    if let CompletionOutcome::Divergence { job } =
                        self.apply_completion(&snapshot).await?
                    {
                        divergent_jobs.push(job.id);
                    }
                }
                Err(ProviderError::RunNotFound(_)) => {
                    // The provider forgot the run; same treatment as a
                    // reported failure.
                    let snapshot = synthetic_failure(run_ref.clone(), "run not found at provider");
                    self.apply_failure(job.clone(), &snapshot, "run not found at provider")
                        .await?;
                }
                Err(err) if err.is_retryable() => {
                    debug!(job_id = %job.id, error = %err, "poll failed transiently, deferring");
                }
                Err(err) => {
                    warn!(job_id = %job.id, error = %err, "poll failed, deferring to next pass");
                }
            }
        }

        // 3. Spend the pass's single retry submission on the first scene
        //    that needs one. Submission refusal on a now-terminal project
        //    is expected after a cap exhaustion above.
        let project = self.load_project(project_id).await?;
        if project.status == ProjectStatus::Rendering {
            self.ensure_video_jobs(project_id).await?;
        }

        // 4. Project derived status from fresh reads.
        let project = self.load_project(project_id).await?;
        let jobs = self.video_jobs(project_id).await?;
        let progress = compute_progress(&project, &jobs);

        Ok(ReconcileOutcome {
            project,
            progress,
            jobs,
            divergent_jobs,
        })
    }
}

/// Build a failure snapshot for signals the engine originates itself
/// (staleness, vanished runs).
fn synthetic_failure(run_ref: RunRef, reason: &str) -> RunSnapshot {
    RunSnapshot {
        run_ref,
        state: ProviderState::Failed,
        output: ProviderOutput::None,
        error: Some(reason.to_string()),
        input_echo: None,
        timing: RunTiming::default(),
    }
}

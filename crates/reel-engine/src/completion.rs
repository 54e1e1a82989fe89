//! Idempotent application of provider completion signals.
//!
//! Webhook deliveries and poll observations both land here. Signals may
//! arrive out of order, duplicated, or for runs whose scene reference has
//! been superseded; every path through this module is safe to replay.

use metrics::counter;
use tracing::{info, warn};

use reel_models::{Job, SceneId};
use reel_provider::{ProviderState, RunSnapshot};

use crate::correlate::{resolve_scene, SceneMatch};
use crate::engine::ReconcileEngine;
use crate::error::{EngineError, EngineResult};

/// What applying one completion signal did.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// Success applied; the scene now has its durable video URL.
    SceneCompleted { job: Job, scene_id: SceneId },
    /// Success applied on the job, but no scene could be safely matched.
    /// The completion is recorded; the divergence is the caller's to
    /// surface.
    Divergence { job: Job },
    /// The job was already terminal; nothing was done. Replay-safe exit.
    AlreadyApplied { job: Job },
    /// Exact duplicate of an already-recorded failure; retries untouched.
    DuplicateFailure { job: Job },
    /// Failure recorded. `project_failed` is set when this failure
    /// exhausted the retry cap and aborted the whole project.
    FailureRecorded { job: Job, project_failed: bool },
    /// Non-terminal signal; nothing to apply yet.
    StillRunning { job: Job },
}

impl ReconcileEngine {
    /// Apply one run observation to the owning job and its scene.
    ///
    /// Fails with [`EngineError::RunNotFound`] when no job is known for the
    /// snapshot's run reference.
    pub async fn apply_completion(
        &self,
        snapshot: &RunSnapshot,
    ) -> EngineResult<CompletionOutcome> {
        let job = self
            .jobs
            .find_by_run_ref(&snapshot.run_ref)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(snapshot.run_ref.to_string()))?;

        match snapshot.state {
            ProviderState::Pending | ProviderState::Running => {
                Ok(CompletionOutcome::StillRunning { job })
            }
            ProviderState::Succeeded => {
                if snapshot.output.first_url().is_some() {
                    self.apply_success(job, snapshot).await
                } else {
                    // A "success" with nothing to show is a failure in
                    // every way that matters downstream.
                    self.apply_failure(job, snapshot, "run succeeded without output")
                        .await
                }
            }
            ProviderState::Failed | ProviderState::Canceled => {
                let reason = snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("provider run {}", snapshot.state));
                self.apply_failure(job, snapshot, &reason).await
            }
        }
    }

    /// Success path. The job is claimed terminally *first* via a
    /// conditional write; the loser of a webhook/poll race observes the
    /// claim and exits before any relocation or scene mutation.
    async fn apply_success(
        &self,
        job: Job,
        snapshot: &RunSnapshot,
    ) -> EngineResult<CompletionOutcome> {
        let provider_urls = snapshot.output.urls();
        let duration_ms = snapshot.timing.duration_ms_or_since(job.created_at);
        let cost = duration_ms.map(|ms| (ms as f64 / 1000.0) * self.config.video_gen_cost_per_sec);

        let claimed = {
            let urls = provider_urls.clone();
            self.jobs
                .update_job_if(&job.id, &move |j| {
                    if j.is_terminal() {
                        return false;
                    }
                    j.succeed(urls.clone(), cost, duration_ms);
                    true
                })
                .await?
        };
        if !claimed.was_applied() {
            counter!("reel_completions_duplicate_total").increment(1);
            return Ok(CompletionOutcome::AlreadyApplied {
                job: claimed.into_job(),
            });
        }
        let mut job = claimed.into_job();
        counter!("reel_completions_applied_total", "result" => "success").increment(1);

        // Provider-hosted outputs expire; republish at a stable URL. On
        // relocation failure the provider URL is kept so a finished run is
        // never thrown away over a copy problem.
        let source_url = job.output_urls.first().cloned().unwrap_or_default();
        let durable_url = match self
            .relocator
            .relocate(&source_url, &format!("videos/{}", job.project_id))
            .await
        {
            Ok(url) => {
                job.output_urls = vec![url.clone()];
                self.jobs.update_job(&job).await?;
                url
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "asset relocation failed, keeping provider url");
                counter!("reel_relocation_failures_total").increment(1);
                source_url
            }
        };

        let mut project = self.load_project(&job.project_id).await?;
        let video_jobs = self.video_jobs(&job.project_id).await?;
        match resolve_scene(&project, &video_jobs, &job, Some(snapshot)) {
            SceneMatch::Exact(idx) | SceneMatch::Content(idx) | SceneMatch::Positional(idx) => {
                let scene_id = project.scenes[idx].id.clone();
                project.scenes[idx].video_url = Some(durable_url);
                project.scenes[idx].video_job_id = Some(job.id.clone());
                project.touch();
                self.projects.update_project(&project).await?;
                info!(job_id = %job.id, scene_id = %scene_id, "scene video completed");
                Ok(CompletionOutcome::SceneCompleted { job, scene_id })
            }
            SceneMatch::Divergent => {
                warn!(job_id = %job.id, run_ref = %snapshot.run_ref, "completed run matches no scene");
                counter!("reel_divergences_total").increment(1);
                Ok(CompletionOutcome::Divergence { job })
            }
        }
    }

    /// Failure path. Applied conditionally: a terminal job is never mutated
    /// again, so neither a replayed delivery nor a conflicting late signal
    /// for the same run (a `canceled` after a `failed`) can burn a second
    /// retry or regress a success.
    pub(crate) async fn apply_failure(
        &self,
        job: Job,
        snapshot: &RunSnapshot,
        reason: &str,
    ) -> EngineResult<CompletionOutcome> {
        let fingerprint = format!("{}:{}:{}", snapshot.run_ref, snapshot.state, reason);

        let updated = {
            let fp = fingerprint.clone();
            let reason = reason.to_string();
            self.jobs
                .update_job_if(&job.id, &move |j| {
                    if j.is_terminal() {
                        return false;
                    }
                    j.fail(reason.clone());
                    j.last_failure_ref = Some(fp.clone());
                    true
                })
                .await?
        };
        if !updated.was_applied() {
            let job = updated.into_job();
            counter!("reel_completions_duplicate_total").increment(1);
            // The stored fingerprint tells a replay of the failure we
            // already recorded apart from some other terminal outcome.
            return if job.last_failure_ref.as_deref() == Some(fingerprint.as_str()) {
                Ok(CompletionOutcome::DuplicateFailure { job })
            } else {
                Ok(CompletionOutcome::AlreadyApplied { job })
            };
        }
        let job = updated.into_job();
        counter!("reel_completions_applied_total", "result" => "failure").increment(1);

        let mut project_failed = false;
        if !job.can_retry(self.retry_cap_for(&job)) {
            // One unrecoverable scene aborts the project; there is no
            // automatic un-failing.
            let mut project = self.load_project(&job.project_id).await?;
            self.mark_project_failed(&mut project, reason).await?;
            project_failed = true;
        }

        Ok(CompletionOutcome::FailureRecorded { job, project_failed })
    }
}

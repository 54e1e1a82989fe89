//! Video-job submission: ensure every scene has generation in flight.

use metrics::counter;
use tracing::{info, warn};

use reel_models::{Job, JobStatus, ProjectId, ProjectStatus, Scene};
use reel_provider::VideoGenInput;

use crate::engine::ReconcileEngine;
use crate::error::{EngineError, EngineResult};

/// What the submission pass did for one project.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    /// Jobs successfully submitted this pass.
    pub submitted: Vec<Job>,
    /// Jobs whose submission was attempted and rejected, with the reason.
    pub failed: Vec<(Job, String)>,
    /// Scenes that already had work in flight or done.
    pub skipped: usize,
}

/// Why a scene needs a submission this pass.
enum Need {
    /// No job has ever been created for the scene.
    Fresh,
    /// The scene's job exists but never reached the provider; resubmit it.
    Resubmit(Job),
    /// The scene's job failed a provider run; a replacement job takes over.
    Replace(Job),
}

impl ReconcileEngine {
    /// Ensure a video-generation job is in flight for every scene that does
    /// not yet have a video.
    ///
    /// Idempotent: scenes with a live (queued/running) job are left alone.
    /// Initial submissions go out for every uncovered scene; retry
    /// submissions (resubmits and replacements) are limited to one per
    /// pass, chosen in scene order. Individual submission rejections are
    /// recorded on the job and reported, never raised, so one bad scene
    /// does not starve the rest.
    pub async fn ensure_video_jobs(
        &self,
        project_id: &ProjectId,
    ) -> EngineResult<SubmissionReport> {
        let mut project = self.load_project(project_id).await?;

        if project.status.is_terminal() {
            return Err(EngineError::precondition(format!(
                "project {} is {} and cannot render",
                project.id, project.status
            )));
        }
        if !project.all_scenes_have_images() {
            return Err(EngineError::precondition(
                "every scene needs an approved image before video generation",
            ));
        }

        let jobs = self.video_jobs(project_id).await?;
        let mut report = SubmissionReport::default();
        let mut retry_slot_used = false;
        let mut project_dirty = false;

        for idx in 0..project.scenes.len() {
            if project.scenes[idx].has_video() {
                report.skipped += 1;
                continue;
            }

            let need = match self.classify_scene(&project.scenes[idx], &jobs) {
                Some(need) => need,
                None => {
                    report.skipped += 1;
                    continue;
                }
            };

            // Retries are throttled to one external submission per pass to
            // bound the call rate per reconciliation tick; first uncovered
            // scene wins. Initial submissions are not throttled.
            let is_retry = !matches!(need, Need::Fresh);
            if is_retry && retry_slot_used {
                report.skipped += 1;
                continue;
            }

            let mut job = match need {
                Need::Fresh => {
                    let job = Job::new_video_gen(project.id.clone());
                    self.jobs.insert_job(&job).await?;
                    job
                }
                Need::Resubmit(job) => job,
                Need::Replace(failed) => {
                    let job = Job::replacement_for(&failed);
                    self.jobs.insert_job(&job).await?;
                    job
                }
            };
            if is_retry {
                retry_slot_used = true;
            }

            let input = VideoGenInput {
                prompt: project.scenes[idx].blurb.clone(),
                // Guarded by the all-images precondition above.
                image_url: project.scenes[idx].image_url.clone().unwrap_or_default(),
                duration_sec: self.config.video_duration_sec,
            };

            match self.provider.submit_video(&input).await {
                Ok(run_ref) => {
                    info!(project_id = %project.id, job_id = %job.id, run_ref = %run_ref, "video job submitted");
                    counter!("reel_jobs_submitted_total", "kind" => "video-gen").increment(1);
                    job.start(run_ref);
                    self.jobs.update_job(&job).await?;
                    project.scenes[idx].video_job_id = Some(job.id.clone());
                    project_dirty = true;
                    report.submitted.push(job);
                }
                Err(err) => {
                    warn!(project_id = %project.id, job_id = %job.id, error = %err, "video job submission rejected");
                    counter!("reel_jobs_failed_total", "kind" => "video-gen", "stage" => "submit")
                        .increment(1);
                    job.fail(err.to_string());
                    self.jobs.update_job(&job).await?;
                    project.scenes[idx].video_job_id = Some(job.id.clone());
                    project_dirty = true;
                    if !job.can_retry(self.config.start_failure_cap) {
                        self.mark_project_failed(&mut project, "video submission retries exhausted")
                            .await?;
                        report.failed.push((job, err.to_string()));
                        return Ok(report);
                    }
                    report.failed.push((job, err.to_string()));
                }
            }
        }

        // A partially started render is still rendering; `Error` is reserved
        // for an exhausted retry budget.
        if project.status != ProjectStatus::Rendering {
            project.status = ProjectStatus::Rendering;
            project_dirty = true;
        }
        if project_dirty {
            project.touch();
            self.projects.update_project(&project).await?;
        }

        Ok(report)
    }

    /// Decide what, if anything, a scene needs. `None` means work is
    /// already in flight (or the scene's failed chain is exhausted and the
    /// project-level failure has been recorded elsewhere).
    fn classify_scene(&self, scene: &Scene, jobs: &[Job]) -> Option<Need> {
        let job = scene
            .video_job_id
            .as_ref()
            .and_then(|id| jobs.iter().find(|j| &j.id == id));

        let Some(job) = job else {
            // No job, or a dangling reference to one that was deleted.
            return Some(Need::Fresh);
        };

        match job.status {
            // Submitted and awaiting a signal.
            JobStatus::Running if job.run_ref.is_some() => None,
            // Created (or force-failed back) without ever reaching the
            // provider; the same job is submitted again.
            JobStatus::Queued | JobStatus::Running => Some(Need::Resubmit(job.clone())),
            // Success with no scene video means the scene reference was
            // superseded; treat as uncovered.
            JobStatus::Success => Some(Need::Fresh),
            JobStatus::Error => {
                if !job.can_retry(self.retry_cap_for(job)) {
                    return None;
                }
                if job.run_ref.is_some() {
                    Some(Need::Replace(job.clone()))
                } else {
                    Some(Need::Resubmit(job.clone()))
                }
            }
        }
    }
}

//! Final composition: concat scene clips with the selected music track.

use chrono::Utc;
use metrics::counter;
use tracing::{error, info};

use reel_models::{music_track_by_id, Job, Project, ProjectId, ProjectStatus};

use crate::engine::ReconcileEngine;
use crate::error::{EngineError, EngineResult};
use crate::progress::rollup_totals;

/// Outcome of a compose request.
#[derive(Debug)]
pub enum ComposeFinalization {
    /// Composition ran; the project is complete.
    Composed(Project),
    /// The project already has its final video; nothing was done.
    AlreadyComposed(Project),
    /// Composition failed. Terminal for the project; video-gen retries do
    /// not apply here.
    Failed { project: Project, reason: String },
}

impl ReconcileEngine {
    /// Compose the final video and roll up project totals.
    ///
    /// Preconditions: every scene has a video and a music track is
    /// selected. Replays after success short-circuit on the recorded final
    /// URL.
    pub async fn finalize_compose(&self, project_id: &ProjectId) -> EngineResult<ComposeFinalization> {
        let mut project = self.load_project(project_id).await?;

        if project.final_video_url.is_some() {
            return Ok(ComposeFinalization::AlreadyComposed(project));
        }
        if project.status == ProjectStatus::Error {
            return Err(EngineError::precondition(format!(
                "project {} is failed and cannot compose",
                project.id
            )));
        }
        if !project.all_scenes_have_videos() {
            return Err(EngineError::precondition(
                "every scene needs a generated video before composing",
            ));
        }
        let track = project
            .music_track_id
            .as_deref()
            .and_then(music_track_by_id)
            .ok_or_else(|| EngineError::precondition("no music track selected"))?;

        let clip_urls: Vec<String> = project
            .scenes
            .iter()
            .filter_map(|s| s.video_url.clone())
            .collect();

        let mut job = Job::new_compose(project.id.clone());
        self.jobs.insert_job(&job).await?;
        let started = Utc::now();

        match self
            .compositor
            .compose(project.id.as_str(), &clip_urls, track.url)
            .await
        {
            Ok(final_url) => {
                let elapsed_ms = (Utc::now() - started).num_milliseconds();
                // Composition runs locally; it adds time but no provider cost.
                job.succeed(vec![final_url.clone()], Some(0.0), Some(elapsed_ms));
                self.jobs.update_job(&job).await?;
                counter!("reel_compose_total", "result" => "success").increment(1);

                let all_jobs = self.jobs.list_jobs(&project.id, None).await?;
                let (total_cost, total_ms) = rollup_totals(&all_jobs);
                project.final_video_url = Some(final_url);
                project.total_cost = Some(total_cost);
                project.total_generation_ms = Some(total_ms);
                project.status = ProjectStatus::Complete;
                project.touch();
                self.projects.update_project(&project).await?;
                info!(project_id = %project.id, total_cost, total_ms, "project composed");
                Ok(ComposeFinalization::Composed(project))
            }
            Err(err) => {
                error!(project_id = %project.id, error = %err, "composition failed");
                counter!("reel_compose_total", "result" => "failure").increment(1);
                job.fail(err.to_string());
                self.jobs.update_job(&job).await?;
                self.mark_project_failed(&mut project, "composition failed")
                    .await?;
                Ok(ComposeFinalization::Failed {
                    project,
                    reason: err.to_string(),
                })
            }
        }
    }
}

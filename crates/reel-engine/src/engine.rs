//! Engine handle and shared helpers.

use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use reel_assets::AssetRelocator;
use reel_compose::Compositor;
use reel_models::{Job, JobKind, Project, ProjectId, ProjectStatus};
use reel_provider::GenerationProvider;
use reel_store::{JobStore, ProjectStore};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// The reconciliation engine.
///
/// Stateless between invocations: every operation re-reads current records,
/// so any number of concurrent callers (status polls, webhook deliveries)
/// can drive the same project. All cross-caller safety is delegated to the
/// store's per-record conditional writes.
pub struct ReconcileEngine {
    pub(crate) projects: Arc<dyn ProjectStore>,
    pub(crate) jobs: Arc<dyn JobStore>,
    pub(crate) provider: Arc<dyn GenerationProvider>,
    pub(crate) relocator: Arc<dyn AssetRelocator>,
    pub(crate) compositor: Arc<dyn Compositor>,
    pub(crate) config: EngineConfig,
}

impl ReconcileEngine {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        jobs: Arc<dyn JobStore>,
        provider: Arc<dyn GenerationProvider>,
        relocator: Arc<dyn AssetRelocator>,
        compositor: Arc<dyn Compositor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            projects,
            jobs,
            provider,
            relocator,
            compositor,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch a project or fail with `ProjectNotFound`.
    pub(crate) async fn load_project(&self, id: &ProjectId) -> EngineResult<Project> {
        self.projects
            .get_project(id)
            .await?
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))
    }

    /// The project's video-gen jobs in creation order.
    pub(crate) async fn video_jobs(&self, project_id: &ProjectId) -> EngineResult<Vec<Job>> {
        Ok(self
            .jobs
            .list_jobs(project_id, Some(JobKind::VideoGen))
            .await?)
    }

    /// Book one image-gen job per approved scene image not yet accounted
    /// for. Image generation runs ahead of the reconciliation loop (scenes
    /// arrive with their images already attached), so these records exist
    /// for the compose-time cost rollup, at the flat per-image rate.
    /// Idempotent: an image URL is booked at most once.
    pub async fn record_scene_images(&self, project: &Project) -> EngineResult<usize> {
        let existing = self
            .jobs
            .list_jobs(&project.id, Some(JobKind::ImageGen))
            .await?;
        let mut booked = 0;
        for scene in &project.scenes {
            let image_url = match scene.image_url.as_deref() {
                Some(url) => url,
                None => continue,
            };
            if existing
                .iter()
                .any(|j| j.output_urls.iter().any(|u| u == image_url))
            {
                continue;
            }
            let mut job = Job::new_image_gen(project.id.clone());
            job.succeed(
                vec![image_url.to_string()],
                Some(self.config.image_gen_cost),
                None,
            );
            self.jobs.insert_job(&job).await?;
            booked += 1;
        }
        Ok(booked)
    }

    /// Move the project to `Error` with a reason, unless it is already
    /// terminal. Terminal statuses are one-way; a late failure signal must
    /// not flip a completed project.
    pub(crate) async fn mark_project_failed(
        &self,
        project: &mut Project,
        reason: &str,
    ) -> EngineResult<()> {
        if project.status.is_terminal() {
            return Ok(());
        }
        warn!(project_id = %project.id, reason, "marking project failed");
        counter!("reel_projects_failed_total").increment(1);
        project.status = ProjectStatus::Error;
        project.touch();
        self.projects.update_project(project).await?;
        Ok(())
    }

    /// The retry cap that applies to a job, by failure class: jobs that
    /// obtained a provider run reference use the (tighter) provider cap,
    /// jobs that never started use the submission cap.
    pub(crate) fn retry_cap_for(&self, job: &Job) -> u32 {
        if job.run_ref.is_some() {
            self.config.provider_failure_cap
        } else {
            self.config.start_failure_cap
        }
    }
}

//! Render-phase handlers: start video generation, poll status, compose.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use reel_engine::ComposeFinalization;
use reel_models::{Job, JobId, JobKind, ProjectStatus, RenderProgress};

use crate::error::{ApiError, ApiResult};
use crate::handlers::projects::load_owned;
use crate::session::require_session;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVideosResponse {
    pub job_ids: Vec<JobId>,
    /// Scenes whose submission was rejected this pass, with reasons.
    /// Rejections are retried on later passes; they are not fatal here.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

/// `POST /api/projects/:id/videos/start` — ensure generation is in flight
/// for every scene without a video.
pub async fn start_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<StartVideosResponse>> {
    let session = require_session(&headers)?;
    let project = load_owned(&state, &id, &session).await?;

    let report = state.engine.ensure_video_jobs(&project.id).await?;
    Ok(Json(StartVideosResponse {
        job_ids: report.submitted.into_iter().map(|j| j.id).collect(),
        rejected: report.failed.into_iter().map(|(_, reason)| reason).collect(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub project_id: String,
    pub status: ProjectStatus,
    pub progress: RenderProgress,
    pub jobs: Vec<Job>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub divergent_jobs: Vec<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
}

/// `GET /api/projects/:id/status` — run one reconciliation pass and return
/// the projected state. Poll-driven progress: the UI calling this every few
/// seconds is what advances rendering.
pub async fn get_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let session = require_session(&headers)?;
    let project = load_owned(&state, &id, &session).await?;

    let outcome = state.engine.reconcile(&project.id).await?;
    let error_message = outcome.failure_reason().map(str::to_string);
    Ok(Json(StatusResponse {
        project_id: outcome.project.id.to_string(),
        status: outcome.project.status,
        progress: outcome.progress,
        jobs: outcome.jobs,
        divergent_jobs: outcome.divergent_jobs,
        error_message,
        final_video_url: outcome.project.final_video_url.clone(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResponse {
    pub final_video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_generation_ms: Option<i64>,
}

/// `POST /api/projects/:id/compose` — concat scene clips with the selected
/// music track and finish the project. Safe to replay once composed.
pub async fn compose_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ComposeResponse>> {
    let session = require_session(&headers)?;
    let project = load_owned(&state, &id, &session).await?;

    let finalization = state.engine.finalize_compose(&project.id).await?;
    let project = match finalization {
        ComposeFinalization::Composed(p) => {
            info!(project_id = %p.id, "compose finished");
            p
        }
        ComposeFinalization::AlreadyComposed(p) => p,
        ComposeFinalization::Failed { reason, .. } => {
            return Err(ApiError::internal(format!("composition failed: {}", reason)));
        }
    };

    let compose_jobs = state
        .jobs
        .list_jobs(&project.id, Some(JobKind::Compose))
        .await?;
    let job_id = compose_jobs.last().map(|j| j.id.clone());

    // Present after a successful finalization; guarded for safety.
    let final_video_url = project
        .final_video_url
        .clone()
        .ok_or_else(|| ApiError::internal("compose finished without a final url"))?;

    Ok(Json(ComposeResponse {
        final_video_url,
        job_id,
        total_cost: project.total_cost,
        total_generation_ms: project.total_generation_ms,
    }))
}

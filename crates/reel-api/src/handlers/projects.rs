//! Project lifecycle handlers: create, fetch, reset, scene management.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use reel_models::{Moodboard, MoodboardImage, Project, ProjectId, ProjectStatus, Scene};

use crate::error::{ApiError, ApiResult};
use crate::session::{check_ownership, require_session};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProjectRequest {
    pub product_prompt: String,
    #[serde(default)]
    pub mood_prompt: Option<String>,
}

/// `POST /api/projects/start` — open a new wizard session project.
pub async fn start_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StartProjectRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    if body.product_prompt.trim().is_empty() {
        return Err(ApiError::bad_request("productPrompt must not be empty"));
    }

    let mut project = Project::new(session, body.product_prompt.trim());
    project.mood_prompt = body.mood_prompt.filter(|m| !m.trim().is_empty());

    state.projects.insert_project(&project).await?;
    info!(project_id = %project.id, "project created");
    Ok(Json(project))
}

/// `GET /api/projects/:id`
pub async fn get_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let project = load_owned(&state, &id, &session).await?;
    Ok(Json(project))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// `DELETE /api/projects/:id` — full reset: project and all of its jobs.
pub async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let session = require_session(&headers)?;
    let project = load_owned(&state, &id, &session).await?;

    state.jobs.delete_jobs_for_project(&project.id).await?;
    state.projects.delete_project(&project.id).await?;
    info!(project_id = %project.id, "project deleted");
    Ok(Json(DeleteResponse { success: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodboardInput {
    pub images: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMoodboardsRequest {
    pub moodboards: Vec<MoodboardInput>,
}

/// `POST /api/projects/:id/moodboards` — attach the generated moodboard
/// sets for the inspire step. Replaces any previous boards.
pub async fn set_moodboards(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SetMoodboardsRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let mut project = load_owned(&state, &id, &session).await?;

    if project.status == ProjectStatus::Rendering || project.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "moodboards are locked once rendering starts (project is {})",
            project.status
        )));
    }
    if body.moodboards.is_empty() {
        return Err(ApiError::bad_request("moodboards must not be empty"));
    }
    if body.moodboards.iter().any(|m| m.images.is_empty()) {
        return Err(ApiError::bad_request("every moodboard needs images"));
    }

    project.moodboards = body
        .moodboards
        .into_iter()
        .map(|input| Moodboard {
            id: uuid::Uuid::new_v4().to_string(),
            images: input
                .images
                .into_iter()
                .map(|url| MoodboardImage {
                    id: uuid::Uuid::new_v4().to_string(),
                    url,
                })
                .collect(),
            label: input.label,
        })
        .collect();
    // A new set invalidates previous likes.
    project.liked_moodboards.clear();
    project.touch();

    state.projects.update_project(&project).await?;
    Ok(Json(project))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeMoodboardsRequest {
    pub liked_moodboard_ids: Vec<String>,
}

/// `POST /api/projects/:id/moodboards/like` — record which boards the
/// visitor liked. The wizard stays in the inspire step; scene selection is
/// what advances it.
pub async fn like_moodboards(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<LikeMoodboardsRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let mut project = load_owned(&state, &id, &session).await?;

    for liked in &body.liked_moodboard_ids {
        if !project.moodboards.iter().any(|m| &m.id == liked) {
            return Err(ApiError::bad_request(format!("unknown moodboard {}", liked)));
        }
    }

    project.liked_moodboards = body.liked_moodboard_ids;
    project.touch();

    state.projects.update_project(&project).await?;
    Ok(Json(project))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInput {
    #[serde(default)]
    pub title: Option<String>,
    pub blurb: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScenesRequest {
    pub scenes: Vec<SceneInput>,
    #[serde(default)]
    pub storyline_option: Option<String>,
}

/// `PUT /api/projects/:id/scenes` — set the ordered scene list once a
/// storyline is chosen. Replaces any previous list; moves the wizard to the
/// story step.
pub async fn update_scenes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateScenesRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let mut project = load_owned(&state, &id, &session).await?;

    if project.status == ProjectStatus::Rendering || project.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "scenes are locked once rendering starts (project is {})",
            project.status
        )));
    }
    if body.scenes.is_empty() {
        return Err(ApiError::bad_request("scenes must not be empty"));
    }
    if body.scenes.iter().any(|s| s.blurb.trim().is_empty()) {
        return Err(ApiError::bad_request("every scene needs a blurb"));
    }

    project.scenes = body
        .scenes
        .into_iter()
        .map(|input| {
            let mut scene = Scene::new(input.blurb.trim());
            scene.title = input.title;
            scene.image_url = input.image_url.filter(|u| !u.is_empty());
            scene
        })
        .collect();
    project.storyline_option = body.storyline_option;
    project.status = ProjectStatus::Story;
    project.touch();

    state.projects.update_project(&project).await?;
    Ok(Json(project))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneImage {
    pub scene_id: String,
    pub image_url: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApproveImagesRequest {
    #[serde(default)]
    pub images: Vec<SceneImage>,
}

/// `POST /api/projects/:id/scenes/images/approve` — attach any supplied
/// image URLs, then assert the video-generation precondition: every scene
/// has an image.
pub async fn approve_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApproveImagesRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let mut project = load_owned(&state, &id, &session).await?;

    for image in body.images {
        let scene = project
            .scenes
            .iter_mut()
            .find(|s| s.id.as_str() == image.scene_id)
            .ok_or_else(|| {
                ApiError::bad_request(format!("unknown scene {}", image.scene_id))
            })?;
        scene.image_url = Some(image.image_url);
    }

    if !project.all_scenes_have_images() {
        return Err(ApiError::bad_request(
            "every scene needs an image before approval",
        ));
    }

    project.touch();
    state.projects.update_project(&project).await?;

    // Account for the externally generated images, at the flat per-image
    // rate, so the compose-time rollup covers the whole pipeline.
    let booked = state.engine.record_scene_images(&project).await?;
    if booked > 0 {
        info!(project_id = %project.id, booked, "scene images recorded");
    }
    Ok(Json(project))
}

/// Load a project and verify session ownership.
pub(crate) async fn load_owned(
    state: &AppState,
    id: &str,
    session: &str,
) -> ApiResult<Project> {
    let project_id = ProjectId::from(id);
    let project = state
        .projects
        .get_project(&project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {}", id)))?;
    check_ownership(&project, session)?;
    Ok(project)
}

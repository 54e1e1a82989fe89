//! Music catalog and selection handlers.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use reel_models::{music_catalog, music_track_by_id, MusicTrack, Project};

use crate::error::{ApiError, ApiResult};
use crate::handlers::projects::load_owned;
use crate::session::require_session;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct MusicOptionsQuery {
    #[serde(default)]
    pub mood: Option<String>,
}

/// `GET /api/music/options` — catalog tracks matching a mood, or the whole
/// catalog.
pub async fn music_options(
    Query(query): Query<MusicOptionsQuery>,
) -> Json<Vec<MusicTrack>> {
    Json(music_catalog(query.mood.as_deref()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectMusicRequest {
    pub track_id: String,
}

/// `POST /api/projects/:id/music/select`
pub async fn select_music(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SelectMusicRequest>,
) -> ApiResult<Json<Project>> {
    let session = require_session(&headers)?;
    let mut project = load_owned(&state, &id, &session).await?;

    let track = music_track_by_id(&body.track_id)
        .ok_or_else(|| ApiError::bad_request(format!("unknown track {}", body.track_id)))?;

    project.music_track_id = Some(track.id.to_string());
    project.touch();
    state.projects.update_project(&project).await?;
    Ok(Json(project))
}

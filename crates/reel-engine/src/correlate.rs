//! Scene↔job correlation resolution.
//!
//! The primary correlation key (`Scene.video_job_id`) is maintained by
//! convention, not by a foreign key, so it can be stale or absent. A job's
//! scene is therefore resolved through a prioritized fallback chain; no
//! match is a surfaced divergence, never a guess.

use tracing::debug;

use reel_models::{Job, Project};
use reel_provider::RunSnapshot;

/// How a job was matched to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMatch {
    /// `scene.video_job_id == job.id`.
    Exact(usize),
    /// The provider's echoed input embeds the scene id.
    Content(usize),
    /// Same index in creation-ordered jobs and in the scene list.
    Positional(usize),
    /// No scene could be safely identified.
    Divergent,
}

impl SceneMatch {
    /// Index of the matched scene, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            SceneMatch::Exact(i) | SceneMatch::Content(i) | SceneMatch::Positional(i) => Some(*i),
            SceneMatch::Divergent => None,
        }
    }
}

/// Resolve the scene a video-gen job updates.
///
/// `video_jobs` must be the project's video-gen jobs in creation order (the
/// positional key). `snapshot` is the provider observation that triggered
/// the resolution, when one is available.
pub fn resolve_scene(
    project: &Project,
    video_jobs: &[Job],
    job: &Job,
    snapshot: Option<&RunSnapshot>,
) -> SceneMatch {
    // 1. Exact reference match.
    if let Some(idx) = project
        .scenes
        .iter()
        .position(|s| s.video_job_id.as_ref() == Some(&job.id))
    {
        return SceneMatch::Exact(idx);
    }

    // 2. Content match: our scene image URLs embed the scene id, and the
    //    provider echoes the submitted input back.
    if let Some(snapshot) = snapshot {
        if let Some(idx) = project
            .scenes
            .iter()
            .position(|s| snapshot.input_echo_contains(s.id.as_str()))
        {
            debug!(job_id = %job.id, scene = %project.scenes[idx].id, "correlated job by input echo");
            return SceneMatch::Content(idx);
        }
    }

    // 3. Positional match, last resort: equal index in both ordered
    //    sequences, and only onto a scene that is not already done.
    if let Some(idx) = video_jobs.iter().position(|j| j.id == job.id) {
        if let Some(scene) = project.scenes.get(idx) {
            if !scene.has_video() {
                debug!(job_id = %job.id, scene = %scene.id, index = idx, "correlated job by position");
                return SceneMatch::Positional(idx);
            }
        }
    }

    SceneMatch::Divergent
}

//! Project and scene models.
//!
//! A project is one wizard session's accumulated state. Scenes are embedded
//! in the project (order is significant: it is the final clip order and the
//! positional-correlation fallback key).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job::JobId;

/// Unique identifier for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    /// Generate a new random project ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a scene within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wizard status of a project.
///
/// `Complete` and `Error` are terminal for a given project instance; the
/// only recovery is deleting the project and starting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Collecting prompts and moodboards
    #[default]
    Inspire,
    /// Storyline chosen, scenes being prepared
    Story,
    /// Video generation in flight
    Rendering,
    /// Final video composed
    Complete,
    /// A job exhausted its retry budget or composition failed
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Inspire => "inspire",
            ProjectStatus::Story => "story",
            ProjectStatus::Rendering => "rendering",
            ProjectStatus::Complete => "complete",
            ProjectStatus::Error => "error",
        }
    }

    /// Check if no further status transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Complete | ProjectStatus::Error)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single moodboard image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodboardImage {
    pub id: String,
    pub url: String,
}

/// A moodboard: a small set of reference images with an optional label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moodboard {
    pub id: String,
    pub images: Vec<MoodboardImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One scene of the storyboard.
///
/// `video_job_id` is a weak reference: the job may have been superseded by a
/// retry or never created at all. Consumers must resolve it defensively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Generation prompt text for this scene.
    pub blurb: String,

    /// Set by the image-generation step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Set exactly once upon confirmed video generation success. Presence is
    /// the sole "done" signal for the scene.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Job currently (or most recently) responsible for this scene's video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_job_id: Option<JobId>,
}

impl Scene {
    /// Create a new scene from a prompt blurb.
    pub fn new(blurb: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            title: None,
            blurb: blurb.into(),
            image_url: None,
            video_url: None,
            video_job_id: None,
        }
    }

    /// Set the scene title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Check whether video generation has finished for this scene.
    pub fn has_video(&self) -> bool {
        self.video_url.is_some()
    }
}

/// A wizard session's accumulated state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,

    /// Opaque per-visitor session identifier; checked on every
    /// project-scoped request.
    pub session_token: String,

    pub product_prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_prompt: Option<String>,

    #[serde(default)]
    pub moodboards: Vec<Moodboard>,

    #[serde(default)]
    pub liked_moodboards: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyline_option: Option<String>,

    /// Ordered scene list. Order is the final clip order.
    #[serde(default)]
    pub scenes: Vec<Scene>,

    #[serde(default)]
    pub status: ProjectStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_track_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,

    /// Sum of cost over all successful jobs, written once at compose time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,

    /// Sum of generation time over all successful jobs, written once at
    /// compose time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_generation_ms: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project in the `Inspire` step.
    pub fn new(session_token: impl Into<String>, product_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            session_token: session_token.into(),
            product_prompt: product_prompt.into(),
            mood_prompt: None,
            moodboards: Vec::new(),
            liked_moodboards: Vec::new(),
            storyline_option: None,
            scenes: Vec::new(),
            status: ProjectStatus::Inspire,
            music_track_id: None,
            final_video_url: None,
            total_cost: None,
            total_generation_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the mood prompt.
    pub fn with_mood_prompt(mut self, mood: impl Into<String>) -> Self {
        self.mood_prompt = Some(mood.into());
        self
    }

    /// Bump the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// All scenes have an image (precondition for video generation).
    pub fn all_scenes_have_images(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(|s| s.image_url.is_some())
    }

    /// All scenes have a generated video.
    pub fn all_scenes_have_videos(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(|s| s.has_video())
    }

    /// Count of scenes with a video.
    pub fn completed_scene_count(&self) -> usize {
        self.scenes.iter().filter(|s| s.has_video()).count()
    }

    /// Find the scene whose weak job reference points at `job_id`.
    pub fn scene_for_job(&self, job_id: &JobId) -> Option<&Scene> {
        self.scenes
            .iter()
            .find(|s| s.video_job_id.as_ref() == Some(job_id))
    }

    /// Mutable variant of [`Self::scene_for_job`].
    pub fn scene_for_job_mut(&mut self, job_id: &JobId) -> Option<&mut Scene> {
        self.scenes
            .iter_mut()
            .find(|s| s.video_job_id.as_ref() == Some(job_id))
    }
}

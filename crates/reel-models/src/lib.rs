//! Shared data models for the Reel Forge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Projects, scenes and their wizard status
//! - Generation jobs and their local lifecycle
//! - Render progress snapshots
//! - The static music catalog

pub mod job;
pub mod music;
pub mod progress;
pub mod project;

// Re-export common types
pub use job::{Job, JobId, JobKind, JobStatus, RunRef};
pub use music::{music_catalog, music_track_by_id, MusicTrack};
pub use progress::RenderProgress;
pub use project::{Moodboard, MoodboardImage, Project, ProjectId, ProjectStatus, Scene, SceneId};

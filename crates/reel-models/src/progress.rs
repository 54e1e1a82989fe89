//! Render progress snapshot.

use serde::{Deserialize, Serialize};

/// Externally visible progress of a project's render phase.
///
/// Computed on demand from current scene and job state; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    /// Scene count.
    pub total: usize,
    /// Scenes with a video URL.
    pub completed: usize,
    /// Jobs currently queued or running.
    pub in_progress: usize,
    /// 1-based index of the scene currently being worked on.
    pub current: usize,
}

impl RenderProgress {
    /// Build a snapshot from counts.
    pub fn new(total: usize, completed: usize, in_progress: usize) -> Self {
        Self {
            total,
            completed,
            in_progress,
            current: (completed + 1).min(total.max(1)),
        }
    }

    /// Whether every scene has its video.
    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

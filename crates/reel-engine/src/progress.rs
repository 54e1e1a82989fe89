//! Derived progress and rollup computation.

use reel_models::{Job, Project, RenderProgress};

/// Project the externally visible render progress from current state.
///
/// Pure function of its inputs; callers pass a fresh read of project and
/// jobs so concurrent passes never disagree about what they computed from.
pub fn compute_progress(project: &Project, video_jobs: &[Job]) -> RenderProgress {
    let total = project.scenes.len();
    let completed = project.completed_scene_count();
    let in_progress = video_jobs
        .iter()
        .filter(|j| j.status.is_active())
        .count();
    RenderProgress::new(total, completed, in_progress)
}

/// Sum cost and generation time over all successful jobs.
///
/// Computed once, at compose time, from job records; never incrementally
/// maintained (incremental counters drift under replayed signals).
pub fn rollup_totals(jobs: &[Job]) -> (f64, i64) {
    jobs.iter()
        .filter(|j| j.status == reel_models::JobStatus::Success)
        .fold((0.0, 0), |(cost, ms), job| {
            (
                cost + job.cost.unwrap_or(0.0),
                ms + job.duration_ms.unwrap_or(0),
            )
        })
}

//! Engine behavior tests against in-memory stores and scripted doubles.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reel_assets::{AssetError, AssetRelocator, AssetResult};
use reel_compose::{ComposeError, ComposeResult, Compositor};
use reel_models::{
    Job, JobKind, JobStatus, Project, ProjectId, ProjectStatus, RunRef, Scene, SceneId,
};
use reel_provider::{
    GenerationProvider, ProviderError, ProviderOutput, ProviderResult, ProviderState, RunSnapshot,
    RunTiming, VideoGenInput,
};
use reel_store::{JobStore, MemoryStore, ProjectStore};

use crate::{
    CompletionOutcome, ComposeFinalization, EngineConfig, EngineError, ReconcileEngine,
};

/// Scripted provider double: submissions hand out sequential run refs
/// unless a rejection is queued; polls answer from a settable map and
/// default to "still running".
#[derive(Default)]
struct ScriptedProvider {
    submissions: Mutex<Vec<VideoGenInput>>,
    submit_rejections: Mutex<VecDeque<ProviderError>>,
    poll_responses: Mutex<HashMap<String, RunSnapshot>>,
}

impl ScriptedProvider {
    fn reject_next_submit(&self, err: ProviderError) {
        self.submit_rejections.lock().unwrap().push_back(err);
    }

    fn set_poll(&self, run_ref: &str, snapshot: RunSnapshot) {
        self.poll_responses
            .lock()
            .unwrap()
            .insert(run_ref.to_string(), snapshot);
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn submit_video(&self, input: &VideoGenInput) -> ProviderResult<RunRef> {
        if let Some(err) = self.submit_rejections.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(input.clone());
        Ok(RunRef::from(format!("run-{}", submissions.len() - 1)))
    }

    async fn poll(&self, run_ref: &RunRef) -> ProviderResult<RunSnapshot> {
        Ok(self
            .poll_responses
            .lock()
            .unwrap()
            .get(run_ref.as_str())
            .cloned()
            .unwrap_or_else(|| running_snapshot(run_ref.as_str())))
    }
}

/// Counting relocator double; failure mode keeps the call observable.
struct CountingRelocator {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRelocator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetRelocator for CountingRelocator {
    async fn relocate(&self, source_url: &str, destination_hint: &str) -> AssetResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AssetError::download_failed(source_url.to_string()));
        }
        Ok(format!("https://cdn.example/{}/relocated.mp4", destination_hint))
    }
}

/// Compositor double. The default instance fails the test if composed.
struct ScriptedCompositor {
    calls: Mutex<Vec<(String, Vec<String>, String)>>,
    result: Option<String>,
}

impl ScriptedCompositor {
    fn never() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result: None,
        }
    }

    fn succeeding(url: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result: Some(url.to_string()),
        }
    }

    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result: Some(String::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Compositor for ScriptedCompositor {
    async fn compose(
        &self,
        project_id: &str,
        clip_urls: &[String],
        music_url: &str,
    ) -> ComposeResult<String> {
        self.calls.lock().unwrap().push((
            project_id.to_string(),
            clip_urls.to_vec(),
            music_url.to_string(),
        ));
        match &self.result {
            None => panic!("compositor invoked unexpectedly"),
            Some(url) if url.is_empty() => Err(ComposeError::FfmpegFailed {
                code: Some(1),
                stderr: "filtergraph error".into(),
            }),
            Some(url) => Ok(url.clone()),
        }
    }
}

struct Harness {
    engine: ReconcileEngine,
    store: Arc<MemoryStore>,
    provider: Arc<ScriptedProvider>,
    relocator: Arc<CountingRelocator>,
    compositor: Arc<ScriptedCompositor>,
}

fn harness_with(
    relocator: CountingRelocator,
    compositor: ScriptedCompositor,
    config: EngineConfig,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(ScriptedProvider::default());
    let relocator = Arc::new(relocator);
    let compositor = Arc::new(compositor);
    let engine = ReconcileEngine::new(
        store.clone() as Arc<dyn ProjectStore>,
        store.clone() as Arc<dyn JobStore>,
        provider.clone() as Arc<dyn GenerationProvider>,
        relocator.clone() as Arc<dyn AssetRelocator>,
        compositor.clone() as Arc<dyn Compositor>,
        config,
    );
    Harness {
        engine,
        store,
        provider,
        relocator,
        compositor,
    }
}

fn harness() -> Harness {
    harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::never(),
        EngineConfig::default(),
    )
}

/// A story-phase project with `n` scenes, each with an approved image
/// whose URL embeds the scene id.
async fn seed_project(store: &MemoryStore, n: usize) -> Project {
    let mut project = Project::new("sess-1", "a desk lamp launch reel");
    project.status = ProjectStatus::Story;
    project.scenes = (0..n)
        .map(|i| {
            let mut scene = Scene::new(format!("scene blurb {}", i));
            scene.id = SceneId::from_string(format!("scene-{}", i));
            scene.image_url = Some(format!("https://cdn.example/images/{}.png", scene.id));
            scene
        })
        .collect();
    store.insert_project(&project).await.unwrap();
    project
}

fn running_snapshot(run_ref: &str) -> RunSnapshot {
    RunSnapshot {
        run_ref: RunRef::from(run_ref),
        state: ProviderState::Running,
        output: ProviderOutput::None,
        error: None,
        input_echo: None,
        timing: RunTiming::default(),
    }
}

fn success_snapshot(run_ref: &str, output_url: &str) -> RunSnapshot {
    RunSnapshot {
        run_ref: RunRef::from(run_ref),
        state: ProviderState::Succeeded,
        output: ProviderOutput::SingleUrl(output_url.to_string()),
        error: None,
        input_echo: None,
        timing: RunTiming {
            started_at: Some(chrono::Utc::now() - chrono::Duration::seconds(5)),
            completed_at: Some(chrono::Utc::now()),
        },
    }
}

fn failure_snapshot(run_ref: &str, error: &str) -> RunSnapshot {
    RunSnapshot {
        run_ref: RunRef::from(run_ref),
        state: ProviderState::Failed,
        output: ProviderOutput::None,
        error: Some(error.to_string()),
        input_echo: None,
        timing: RunTiming::default(),
    }
}

async fn video_jobs(store: &MemoryStore, project_id: &ProjectId) -> Vec<Job> {
    store
        .list_jobs(project_id, Some(JobKind::VideoGen))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ensure_submits_one_job_per_scene() {
    let h = harness();
    let project = seed_project(&h.store, 3).await;

    let report = h.engine.ensure_video_jobs(&project.id).await.unwrap();
    assert_eq!(report.submitted.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(h.provider.submission_count(), 3);

    let jobs = video_jobs(&h.store, &project.id).await;
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Running));
    assert!(jobs.iter().all(|j| j.run_ref.is_some()));

    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Rendering);
    assert!(project.scenes.iter().all(|s| s.video_job_id.is_some()));
}

#[tokio::test]
async fn test_ensure_is_idempotent_for_inflight_jobs() {
    let h = harness();
    let project = seed_project(&h.store, 3).await;

    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    let report = h.engine.ensure_video_jobs(&project.id).await.unwrap();

    assert!(report.submitted.is_empty());
    assert_eq!(report.skipped, 3);
    assert_eq!(h.provider.submission_count(), 3);
    assert_eq!(video_jobs(&h.store, &project.id).await.len(), 3);
}

#[tokio::test]
async fn test_ensure_requires_scene_images() {
    let h = harness();
    let mut project = seed_project(&h.store, 2).await;
    project.scenes[1].image_url = None;
    h.store.update_project(&project).await.unwrap();

    let err = h.engine.ensure_video_jobs(&project.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert_eq!(h.provider.submission_count(), 0);
}

#[tokio::test]
async fn test_image_booking_is_flat_rate_and_idempotent() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;

    let booked = h.engine.record_scene_images(&project).await.unwrap();
    assert_eq!(booked, 2);
    // Replayed approval books nothing new.
    let booked = h.engine.record_scene_images(&project).await.unwrap();
    assert_eq!(booked, 0);

    let jobs = h
        .store
        .list_jobs(&project.id, Some(JobKind::ImageGen))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Success));
    assert!(jobs
        .iter()
        .all(|j| j.cost == Some(h.engine.config().image_gen_cost)));
}

#[tokio::test]
async fn test_submission_rejection_is_recorded_not_raised() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;
    h.provider
        .reject_next_submit(ProviderError::SubmissionRejected("quota exceeded".into()));

    let report = h.engine.ensure_video_jobs(&project.id).await.unwrap();

    // First scene failed, second still went out.
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.submitted.len(), 1);
    let (failed_job, reason) = &report.failed[0];
    assert_eq!(failed_job.status, JobStatus::Error);
    assert_eq!(failed_job.retries, 1);
    assert!(reason.contains("quota exceeded"));

    // Partially started is still rendering.
    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Rendering);
}

#[tokio::test]
async fn test_one_retry_submission_per_pass() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;
    h.provider
        .reject_next_submit(ProviderError::SubmissionRejected("bad day".into()));
    h.provider
        .reject_next_submit(ProviderError::SubmissionRejected("bad day".into()));

    // Initial pass: both scenes attempted (initial submissions are not
    // throttled), both rejected.
    let report = h.engine.ensure_video_jobs(&project.id).await.unwrap();
    assert_eq!(report.failed.len(), 2);

    // Retry pass: only the first scene's job is resubmitted.
    let report = h.engine.ensure_video_jobs(&project.id).await.unwrap();
    assert_eq!(report.submitted.len(), 1);
    assert_eq!(report.skipped, 1);

    let jobs = video_jobs(&h.store, &project.id).await;
    let running = jobs.iter().filter(|j| j.status == JobStatus::Running).count();
    assert_eq!(running, 1);
}

#[tokio::test]
async fn test_start_failure_cap_exhaustion_fails_project() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::never(),
        EngineConfig {
            start_failure_cap: 2,
            ..EngineConfig::default()
        },
    );
    let project = seed_project(&h.store, 1).await;
    for _ in 0..2 {
        h.provider
            .reject_next_submit(ProviderError::SubmissionRejected("nope".into()));
    }

    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Error);

    // Terminal projects refuse further submission passes.
    let err = h.engine.ensure_video_jobs(&project.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
}

#[tokio::test]
async fn test_success_completion_relocates_once_and_updates_scene() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let snapshot = success_snapshot("run-0", "https://provider.example/tmp/out.mp4");
    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    let scene_id = match outcome {
        CompletionOutcome::SceneCompleted { scene_id, ref job } => {
            assert_eq!(job.status, JobStatus::Success);
            assert!(job.cost.unwrap() > 0.0);
            scene_id
        }
        other => panic!("expected SceneCompleted, got {:?}", other),
    };
    assert_eq!(h.relocator.call_count(), 1);

    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    let scene = stored.scenes.iter().find(|s| s.id == scene_id).unwrap();
    let video_url = scene.video_url.as_deref().unwrap();
    assert!(video_url.starts_with("https://cdn.example/videos/"));

    // Replay (poll racing the webhook): no second relocation, no mutation.
    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::AlreadyApplied { .. }));
    assert_eq!(h.relocator.call_count(), 1);
}

#[tokio::test]
async fn test_relocation_failure_falls_back_to_provider_url() {
    let h = harness_with(
        CountingRelocator::failing(),
        ScriptedCompositor::never(),
        EngineConfig::default(),
    );
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let snapshot = success_snapshot("run-0", "https://provider.example/tmp/out.mp4");
    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::SceneCompleted { .. }));

    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(
        stored.scenes[0].video_url.as_deref(),
        Some("https://provider.example/tmp/out.mp4")
    );
}

#[tokio::test]
async fn test_duplicate_failure_delivery_does_not_burn_a_retry() {
    let h = harness();
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let snapshot = failure_snapshot("run-0", "model crashed");
    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    match outcome {
        CompletionOutcome::FailureRecorded { ref job, project_failed } => {
            assert_eq!(job.retries, 1);
            assert!(!project_failed);
        }
        other => panic!("expected FailureRecorded, got {:?}", other),
    }

    // Exact duplicate of the same delivery.
    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    match outcome {
        CompletionOutcome::DuplicateFailure { ref job } => assert_eq!(job.retries, 1),
        other => panic!("expected DuplicateFailure, got {:?}", other),
    }

    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProjectStatus::Rendering);
}

#[tokio::test]
async fn test_conflicting_late_signal_does_not_burn_a_second_retry() {
    let h = harness();
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    h.engine
        .apply_completion(&failure_snapshot("run-0", "model crashed"))
        .await
        .unwrap();

    // The provider later reports the same run as canceled: a different
    // signal than the recorded failure, but the job is already terminal.
    let mut canceled = failure_snapshot("run-0", "model crashed");
    canceled.state = ProviderState::Canceled;
    canceled.error = None;
    let outcome = h.engine.apply_completion(&canceled).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::AlreadyApplied { .. }));

    let jobs = video_jobs(&h.store, &project.id).await;
    assert_eq!(jobs[0].retries, 1);
    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProjectStatus::Rendering);
}

#[tokio::test]
async fn test_provider_failure_cap_exhaustion_fails_project() {
    let h = harness();
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    // First run fails: one retry consumed, replacement job goes out.
    let outcome = h
        .engine
        .apply_completion(&failure_snapshot("run-0", "model crashed"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CompletionOutcome::FailureRecorded { project_failed: false, .. }
    ));
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let jobs = video_jobs(&h.store, &project.id).await;
    assert_eq!(jobs.len(), 2);
    let replacement = &jobs[1];
    assert_eq!(replacement.retries, 1);
    assert_eq!(replacement.status, JobStatus::Running);

    // The replacement's run also fails: provider cap (2) is exhausted.
    let outcome = h
        .engine
        .apply_completion(&failure_snapshot("run-1", "model crashed again"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CompletionOutcome::FailureRecorded { project_failed: true, .. }
    ));

    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProjectStatus::Error);

    // A late cancellation for the exhausted run never moves the chain's
    // retry count past the cap.
    let mut canceled = failure_snapshot("run-1", "model crashed again");
    canceled.state = ProviderState::Canceled;
    let outcome = h.engine.apply_completion(&canceled).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::AlreadyApplied { .. }));
    let jobs = video_jobs(&h.store, &project.id).await;
    assert_eq!(jobs[1].retries, h.engine.config().provider_failure_cap);
}

#[tokio::test]
async fn test_late_failure_never_regresses_a_successful_job() {
    let h = harness();
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    h.engine
        .apply_completion(&success_snapshot("run-0", "https://provider.example/out.mp4"))
        .await
        .unwrap();

    // A stale failure signal for the same run arrives afterwards.
    let outcome = h
        .engine
        .apply_completion(&failure_snapshot("run-0", "spurious"))
        .await
        .unwrap();
    assert!(matches!(outcome, CompletionOutcome::AlreadyApplied { .. }));

    let jobs = video_jobs(&h.store, &project.id).await;
    assert_eq!(jobs[0].status, JobStatus::Success);
    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert!(stored.scenes[0].has_video());
}

#[tokio::test]
async fn test_unknown_run_ref_is_an_error() {
    let h = harness();
    let err = h
        .engine
        .apply_completion(&success_snapshot("run-ghost", "https://x.example/a.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RunNotFound(_)));
}

#[tokio::test]
async fn test_completion_for_superseded_reference_falls_back_to_content_match() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    // Scene 0's reference gets overwritten, as a later retry would do.
    let mut stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    stored.scenes[0].video_job_id = None;
    h.store.update_project(&stored).await.unwrap();

    // The run's echoed input still carries scene-0's image URL.
    let mut snapshot = success_snapshot("run-0", "https://provider.example/out.mp4");
    snapshot.input_echo = Some(serde_json::json!({
        "first_frame_image": "https://cdn.example/images/scene-0.png"
    }));

    let outcome = h.engine.apply_completion(&snapshot).await.unwrap();
    match outcome {
        CompletionOutcome::SceneCompleted { scene_id, .. } => {
            assert_eq!(scene_id.as_str(), "scene-0");
        }
        other => panic!("expected SceneCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unmatchable_completion_is_surfaced_as_divergence() {
    let h = harness();
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    // Scene completes through another job and loses the reference.
    let mut stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    stored.scenes[0].video_job_id = None;
    stored.scenes[0].video_url = Some("https://cdn.example/elsewhere.mp4".into());
    h.store.update_project(&stored).await.unwrap();

    let outcome = h
        .engine
        .apply_completion(&success_snapshot("run-0", "https://provider.example/out.mp4"))
        .await
        .unwrap();
    match outcome {
        CompletionOutcome::Divergence { ref job } => {
            // Recorded on the job even though no scene was touched.
            assert_eq!(job.status, JobStatus::Success);
        }
        other => panic!("expected Divergence, got {:?}", other),
    }
    let stored = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(
        stored.scenes[0].video_url.as_deref(),
        Some("https://cdn.example/elsewhere.mp4")
    );
}

#[tokio::test]
async fn test_reconcile_polls_and_applies_completions() {
    let h = harness();
    let project = seed_project(&h.store, 2).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    h.provider.set_poll(
        "run-0",
        success_snapshot("run-0", "https://provider.example/a.mp4"),
    );

    let outcome = h.engine.reconcile(&project.id).await.unwrap();

    assert_eq!(outcome.project.status, ProjectStatus::Rendering);
    assert_eq!(outcome.progress.total, 2);
    assert_eq!(outcome.progress.completed, 1);
    assert_eq!(outcome.progress.in_progress, 1);
    assert_eq!(outcome.progress.current, 2);
    assert!(outcome.divergent_jobs.is_empty());
}

#[tokio::test]
async fn test_reconcile_force_fails_stale_jobs() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::never(),
        EngineConfig {
            stale_after_secs: 60,
            ..EngineConfig::default()
        },
    );
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    // Backdate the running job past the staleness threshold.
    let mut job = video_jobs(&h.store, &project.id).await.remove(0);
    job.updated_at = chrono::Utc::now() - chrono::Duration::minutes(20);
    h.store.update_job(&job).await.unwrap();

    let outcome = h.engine.reconcile(&project.id).await.unwrap();

    // The stale run was failed and the pass's retry slot already sent a
    // replacement out.
    let jobs = &outcome.jobs;
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].status, JobStatus::Error);
    assert_eq!(jobs[0].error_message.as_deref(), Some("generation timed out"));
    assert_eq!(jobs[1].status, JobStatus::Running);
    assert_eq!(outcome.project.status, ProjectStatus::Rendering);
}

#[tokio::test]
async fn test_reconcile_is_a_noop_on_terminal_projects() {
    let h = harness();
    let mut project = seed_project(&h.store, 1).await;
    project.status = ProjectStatus::Complete;
    h.store.update_project(&project).await.unwrap();

    let outcome = h.engine.reconcile(&project.id).await.unwrap();
    assert_eq!(outcome.project.status, ProjectStatus::Complete);
    assert_eq!(h.provider.submission_count(), 0);
}

#[tokio::test]
async fn test_reconcile_surfaces_failure_reason() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::never(),
        EngineConfig {
            provider_failure_cap: 1,
            ..EngineConfig::default()
        },
    );
    let project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    h.engine
        .apply_completion(&failure_snapshot("run-0", "content policy violation"))
        .await
        .unwrap();

    let outcome = h.engine.reconcile(&project.id).await.unwrap();
    assert_eq!(outcome.project.status, ProjectStatus::Error);
    assert_eq!(outcome.failure_reason(), Some("content policy violation"));
}

async fn complete_all_scenes(h: &Harness, project_id: &ProjectId) {
    let jobs = video_jobs(&h.store, project_id).await;
    for job in jobs {
        let run_ref = job.run_ref.unwrap();
        let url = format!("https://provider.example/{}.mp4", run_ref);
        h.engine
            .apply_completion(&success_snapshot(run_ref.as_str(), &url))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_compose_finalizes_project_with_rollup() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::succeeding("https://cdn.example/final/final.mp4"),
        EngineConfig::default(),
    );
    let mut project = seed_project(&h.store, 2).await;
    h.engine.record_scene_images(&project).await.unwrap();
    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    complete_all_scenes(&h, &project.id).await;

    project = h.store.get_project(&project.id).await.unwrap().unwrap();
    project.music_track_id = Some("upbeat-1".into());
    h.store.update_project(&project).await.unwrap();

    let outcome = h.engine.finalize_compose(&project.id).await.unwrap();
    let composed = match outcome {
        ComposeFinalization::Composed(p) => p,
        other => panic!("expected Composed, got {:?}", other),
    };
    assert_eq!(composed.status, ProjectStatus::Complete);
    assert_eq!(
        composed.final_video_url.as_deref(),
        Some("https://cdn.example/final/final.mp4")
    );
    // Two successful 5s video runs at $0.01/s plus two flat-rate images,
    // compose itself free.
    let cost = composed.total_cost.unwrap();
    assert!((cost - 0.102).abs() < 0.02, "unexpected rollup {}", cost);
    assert!(composed.total_generation_ms.unwrap() > 0);
    assert_eq!(h.compositor.call_count(), 1);

    // Replay short-circuits without composing again.
    let outcome = h.engine.finalize_compose(&project.id).await.unwrap();
    assert!(matches!(outcome, ComposeFinalization::AlreadyComposed(_)));
    assert_eq!(h.compositor.call_count(), 1);
}

#[tokio::test]
async fn test_compose_requires_all_videos_and_music() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::succeeding("https://cdn.example/final/final.mp4"),
        EngineConfig::default(),
    );
    let project = seed_project(&h.store, 2).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();

    let err = h.engine.finalize_compose(&project.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));

    complete_all_scenes(&h, &project.id).await;
    // Videos done but no track selected.
    let err = h.engine.finalize_compose(&project.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert_eq!(h.compositor.call_count(), 0);
}

#[tokio::test]
async fn test_compose_failure_is_terminal_for_the_project() {
    let h = harness_with(
        CountingRelocator::new(),
        ScriptedCompositor::failing(),
        EngineConfig::default(),
    );
    let mut project = seed_project(&h.store, 1).await;
    h.engine.ensure_video_jobs(&project.id).await.unwrap();
    complete_all_scenes(&h, &project.id).await;

    project = h.store.get_project(&project.id).await.unwrap().unwrap();
    project.music_track_id = Some("ambient-1".into());
    h.store.update_project(&project).await.unwrap();

    let outcome = h.engine.finalize_compose(&project.id).await.unwrap();
    match outcome {
        ComposeFinalization::Failed { project, reason } => {
            assert_eq!(project.status, ProjectStatus::Error);
            assert!(reason.contains("FFmpeg"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    // Failed composition leaves a compose job record behind.
    let compose_jobs = h
        .store
        .list_jobs(&project.id, Some(JobKind::Compose))
        .await
        .unwrap();
    assert_eq!(compose_jobs.len(), 1);
    assert_eq!(compose_jobs[0].status, JobStatus::Error);
}

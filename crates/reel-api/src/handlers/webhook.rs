//! Generation provider webhook receiver.
//!
//! Deliveries are at-least-once and unauthenticated beyond the obscurity of
//! the endpoint (the provider signs nothing in this integration). Every
//! delivery funnels into the same idempotent completion application as
//! polling, so replays and races with the status endpoint are harmless.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use reel_engine::{CompletionOutcome, EngineError};
use reel_provider::WebhookPayload;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
}

/// `POST /api/webhook/provider`
///
/// 400 only for structurally invalid payloads (nothing to resolve a run
/// by); the provider retries those forever otherwise. 404 for a run no job
/// claims. Everything else, including replays of already-applied
/// completions, answers 200.
pub async fn provider_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> ApiResult<Json<WebhookResponse>> {
    let Some(snapshot) = payload.into_snapshot() else {
        metrics::record_webhook("malformed");
        return Err(ApiError::bad_request(
            "webhook payload missing run reference or status",
        ));
    };

    let run_ref = snapshot.run_ref.clone();
    match state.engine.apply_completion(&snapshot).await {
        Ok(outcome) => {
            let result = match &outcome {
                CompletionOutcome::SceneCompleted { .. } => "scene_completed",
                CompletionOutcome::Divergence { .. } => "divergence",
                CompletionOutcome::AlreadyApplied { .. } => "already_applied",
                CompletionOutcome::DuplicateFailure { .. } => "duplicate_failure",
                CompletionOutcome::FailureRecorded { .. } => "failure_recorded",
                CompletionOutcome::StillRunning { .. } => "still_running",
            };
            info!(run_ref = %run_ref, result, "webhook applied");
            metrics::record_webhook(result);
            Ok(Json(WebhookResponse { success: true }))
        }
        Err(EngineError::RunNotFound(run_ref)) => {
            warn!(run_ref = %run_ref, "webhook for unknown run");
            metrics::record_webhook("unknown_run");
            Err(ApiError::not_found(format!("run {}", run_ref)))
        }
        Err(err) => Err(err.into()),
    }
}

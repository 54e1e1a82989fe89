//! Provider wire types and output normalization.
//!
//! Providers report output as a bare string, an array, or a nested object
//! depending on the model. All of that is flattened into [`ProviderOutput`]
//! here, at the adapter boundary, so shape-sniffing never reaches the
//! reconciliation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reel_models::RunRef;

/// Provider-side run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// Accepted but not yet scheduled ("starting" on Replicate)
    #[serde(alias = "starting")]
    Pending,
    /// Actively executing ("processing" on Replicate)
    #[serde(alias = "processing")]
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl ProviderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProviderState::Succeeded | ProviderState::Failed | ProviderState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderState::Pending => "pending",
            ProviderState::Running => "running",
            ProviderState::Succeeded => "succeeded",
            ProviderState::Failed => "failed",
            ProviderState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized run output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutput {
    None,
    SingleUrl(String),
    MultiUrl(Vec<String>),
}

impl ProviderOutput {
    /// Normalize a raw provider output value.
    ///
    /// Handles: bare string, array of strings, and objects carrying the URL
    /// under a conventional key (`url`, `video`, `output`).
    pub fn from_raw(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => ProviderOutput::None,
            Some(Value::String(s)) if !s.is_empty() => ProviderOutput::SingleUrl(s.clone()),
            Some(Value::Array(items)) => {
                let urls: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                match urls.len() {
                    0 => ProviderOutput::None,
                    1 => ProviderOutput::SingleUrl(urls.into_iter().next().unwrap()),
                    _ => ProviderOutput::MultiUrl(urls),
                }
            }
            Some(Value::Object(map)) => ["url", "video", "output"]
                .iter()
                .find_map(|key| map.get(*key))
                .map(|v| ProviderOutput::from_raw(Some(v)))
                .unwrap_or(ProviderOutput::None),
            _ => ProviderOutput::None,
        }
    }

    /// The first (primary) output URL, if any.
    pub fn first_url(&self) -> Option<&str> {
        match self {
            ProviderOutput::None => None,
            ProviderOutput::SingleUrl(url) => Some(url),
            ProviderOutput::MultiUrl(urls) => urls.first().map(String::as_str),
        }
    }

    /// All output URLs.
    pub fn urls(&self) -> Vec<String> {
        match self {
            ProviderOutput::None => Vec::new(),
            ProviderOutput::SingleUrl(url) => vec![url.clone()],
            ProviderOutput::MultiUrl(urls) => urls.clone(),
        }
    }
}

/// Run timing as reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunTiming {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunTiming {
    /// Wall-clock generation duration, when both endpoints are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_milliseconds())
            }
            _ => None,
        }
    }

    /// Duration against a fallback start (the job's own creation time),
    /// used when the provider omits `started_at`.
    pub fn duration_ms_or_since(&self, fallback_start: DateTime<Utc>) -> Option<i64> {
        self.duration_ms().or_else(|| {
            self.completed_at
                .filter(|end| *end >= fallback_start)
                .map(|end| (end - fallback_start).num_milliseconds())
        })
    }
}

/// One observation of a provider run, from either a poll or a webhook.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run_ref: RunRef,
    pub state: ProviderState,
    pub output: ProviderOutput,
    pub error: Option<String>,
    /// Echo of the submitted input, used for content-based correlation.
    pub input_echo: Option<Value>,
    pub timing: RunTiming,
}

impl RunSnapshot {
    /// Whether any string in the echoed input contains `needle`.
    ///
    /// Correlation heuristic for providers that do not echo caller-supplied
    /// ids: our scene image URLs embed the scene id, so the echo does too.
    pub fn input_echo_contains(&self, needle: &str) -> bool {
        fn walk(value: &Value, needle: &str) -> bool {
            match value {
                Value::String(s) => s.contains(needle),
                Value::Array(items) => items.iter().any(|v| walk(v, needle)),
                Value::Object(map) => map.values().any(|v| walk(v, needle)),
                _ => false,
            }
        }
        self.input_echo
            .as_ref()
            .map_or(false, |echo| walk(echo, needle))
    }
}

/// Input for a scene video generation run.
#[derive(Debug, Clone, Serialize)]
pub struct VideoGenInput {
    /// Scene prompt text.
    pub prompt: String,
    /// Guidance image; the URL embeds the scene id.
    pub image_url: String,
    /// Requested clip length in seconds.
    pub duration_sec: u32,
}

/// Webhook delivery body (Replicate prediction event shape).
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Run reference. Structurally required; its absence is a client error.
    pub id: Option<String>,
    pub status: Option<ProviderState>,
    #[serde(default)]
    pub output: Option<Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WebhookPayload {
    /// Convert into a run snapshot, or `None` when the payload has no run
    /// reference or state.
    pub fn into_snapshot(self) -> Option<RunSnapshot> {
        let run_ref = RunRef::from_string(self.id?);
        let state = self.status?;
        Some(RunSnapshot {
            run_ref,
            state,
            output: ProviderOutput::from_raw(self.output.as_ref()),
            error: self.error,
            input_echo: self.input,
            timing: RunTiming {
                started_at: self.started_at,
                completed_at: self.completed_at,
            },
        })
    }
}

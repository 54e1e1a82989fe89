//! Engine configuration.

use chrono::Duration;

/// Reconciliation engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max (re)submission attempts for a job that never obtained a run
    /// reference.
    pub start_failure_cap: u32,
    /// Max failure cycles for a job whose provider run failed or was
    /// canceled. Reaching it marks the whole project as failed.
    pub provider_failure_cap: u32,
    /// Requested clip length per scene.
    pub video_duration_sec: u32,
    /// A running job with a run reference but no terminal signal for this
    /// long is force-failed on the next reconciliation pass.
    pub stale_after_secs: i64,
    /// Rough video generation price per second of provider run time.
    pub video_gen_cost_per_sec: f64,
    /// Flat image generation price.
    pub image_gen_cost: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_failure_cap: 3,
            provider_failure_cap: 2,
            video_duration_sec: 5,
            stale_after_secs: 600,
            video_gen_cost_per_sec: 0.01,
            image_gen_cost: 0.001,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            start_failure_cap: env_parse("ENGINE_START_FAILURE_CAP", defaults.start_failure_cap),
            provider_failure_cap: env_parse(
                "ENGINE_PROVIDER_FAILURE_CAP",
                defaults.provider_failure_cap,
            ),
            video_duration_sec: env_parse("ENGINE_VIDEO_DURATION_SEC", defaults.video_duration_sec),
            stale_after_secs: env_parse("ENGINE_STALE_AFTER_SECS", defaults.stale_after_secs),
            video_gen_cost_per_sec: defaults.video_gen_cost_per_sec,
            image_gen_cost: defaults.image_gen_cost,
        }
    }

    /// Staleness threshold as a chrono duration.
    pub fn stale_after(&self) -> Duration {
        Duration::seconds(self.stale_after_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

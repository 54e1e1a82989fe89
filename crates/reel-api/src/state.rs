//! Application state.

use std::sync::Arc;

use reel_assets::{AssetRelocator, BucketClient, BucketRelocator};
use reel_compose::{Compositor, FfmpegCompositor};
use reel_engine::{EngineConfig, ReconcileEngine};
use reel_provider::{GenerationProvider, ReplicateClient};
use reel_store::{JobStore, MemoryStore, ProjectStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub projects: Arc<dyn ProjectStore>,
    pub jobs: Arc<dyn JobStore>,
    pub engine: Arc<ReconcileEngine>,
}

impl AppState {
    /// Create new application state from the environment.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ReplicateClient::from_env()?);
        let bucket = Arc::new(BucketClient::from_env()?);
        let relocator = Arc::new(BucketRelocator::new(BucketClient::from_env()?));
        let compositor = Arc::new(FfmpegCompositor::new(bucket));

        let engine = Arc::new(ReconcileEngine::new(
            store.clone() as Arc<dyn ProjectStore>,
            store.clone() as Arc<dyn JobStore>,
            provider as Arc<dyn GenerationProvider>,
            relocator as Arc<dyn AssetRelocator>,
            compositor as Arc<dyn Compositor>,
            EngineConfig::from_env(),
        ));

        Ok(Self {
            config,
            projects: store.clone() as Arc<dyn ProjectStore>,
            jobs: store as Arc<dyn JobStore>,
            engine,
        })
    }

    /// State wired to the given components, used by tests.
    pub fn with_components(
        config: ApiConfig,
        store: Arc<MemoryStore>,
        engine: Arc<ReconcileEngine>,
    ) -> Self {
        Self {
            config,
            projects: store.clone() as Arc<dyn ProjectStore>,
            jobs: store as Arc<dyn JobStore>,
            engine,
        }
    }
}

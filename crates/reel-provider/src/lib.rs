//! Generation provider adapter.
//!
//! This crate provides:
//! - The `GenerationProvider` trait (submit + poll)
//! - A Replicate-compatible HTTP client with transient-failure retry
//! - Webhook payload parsing and output normalization into a single tagged
//!   result type

pub mod client;
pub mod error;
pub mod types;

pub use client::{GenerationProvider, ProviderConfig, ReplicateClient};
pub use error::{ProviderError, ProviderResult};
pub use types::{
    ProviderOutput, ProviderState, RunSnapshot, RunTiming, VideoGenInput, WebhookPayload,
};

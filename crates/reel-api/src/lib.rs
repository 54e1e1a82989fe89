//! Axum HTTP API server.
//!
//! This crate provides:
//! - The wizard REST surface: project lifecycle, scene management, video
//!   start, status polling, music selection, compose
//! - The generation-provider webhook receiver
//! - Session-token ownership checks, CORS, security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

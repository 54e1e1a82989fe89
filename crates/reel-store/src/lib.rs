//! Keyed record store for projects and jobs.
//!
//! This crate provides:
//! - `ProjectStore` / `JobStore` traits with per-record conditional writes
//! - An in-memory implementation for single-node deployments and tests

pub mod error;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{JobMutation, JobStore, JobUpdate, ProjectStore};

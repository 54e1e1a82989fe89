//! Durable asset storage.
//!
//! This crate provides:
//! - An S3-compatible (R2) bucket client with public-URL addressing
//! - The `AssetRelocator` trait: download a provider-hosted asset and
//!   republish it at a stable public URL

pub mod client;
pub mod error;
pub mod relocator;

pub use client::{guess_content_type, BucketClient, BucketConfig};
pub use error::{AssetError, AssetResult};
pub use relocator::{AssetRelocator, BucketRelocator};

//! Final video composition.
//!
//! This crate provides:
//! - A multi-input FFmpeg command builder and runner
//! - The `Compositor` trait and its FFmpeg implementation (clip concat +
//!   music bed, published to the asset bucket)

pub mod command;
pub mod compositor;
pub mod error;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use compositor::{Compositor, FfmpegCompositor};
pub use error::{ComposeError, ComposeResult};

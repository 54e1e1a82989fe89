//! Request handlers.

pub mod health;
pub mod music;
pub mod projects;
pub mod videos;
pub mod webhook;

//! Offline worker - versioned, content-addressed caching for web apps
//!
//! Installs application versions described by a manifest into named caches,
//! serves requests from them through a plugin pipeline, and promotes new
//! versions atomically.

pub mod adapter;
pub mod cache;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod log;
pub mod manifest;
pub mod plugins;
pub mod task;
pub mod ui;
pub mod worker;

pub use error::{WorkerError, WorkerResult};

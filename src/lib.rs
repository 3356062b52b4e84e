//! Agrimedia - image retrieval and caching engine for agricultural marketplaces
//!
//! Requests resolve through the bounded cache, then Unsplash and Pexels in
//! priority order, then bundled fallback assets, so callers always get an
//! image. The library crate exposes every layer for integration testing.

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod metrics;
pub mod monitoring;
pub mod providers;
pub mod service;

pub use engine::{BackgroundTasks, MediaEngine};
pub use service::{MediaRequest, MediaService, PreloadSummary};

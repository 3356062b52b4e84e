//! External image content providers.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and normalized result types.
//! - [`query`] -- Query sanitizing and category enrichment.
//! - [`unsplash`] / [`pexels`] -- Concrete adapters.
//! - [`registry`] -- Priority-ordered provider collection.

pub mod pexels;
pub mod provider;
pub mod query;
pub mod registry;
pub mod unsplash;

pub use pexels::PexelsProvider;
pub use provider::{
    ImageProvider, ImageSize, ImageUrls, Orientation, ProviderImage, SearchOptions, MAX_RESULTS,
};
pub use query::{
    sanitize_query, FirstTermSelector, QueryEnricher, RandomTermSelector, TermSelector,
};
pub use registry::ProviderRegistry;
pub use unsplash::UnsplashProvider;

//! Agrimedia-Common: Shared types, typed IDs, and the error model.
//!
//! This crate provides the pieces every layer of agrimedia agrees on:
//!
//! - **Image descriptors**: [`ImageDescriptor`] with its attribution,
//!   provenance, and metadata.
//! - **Typed IDs**: UUID wrappers for alerts and tracked operations.
//! - **Error handling**: [`MediaError`] and its retry/fallback
//!   classification.
//!
//! # Examples
//!
//! ```
//! use agrimedia_common::{Attribution, ErrorCode, MediaError, Provenance};
//!
//! let attribution = Attribution::bundled();
//! assert!(!attribution.required);
//!
//! let err = MediaError::quota_exceeded("unsplash");
//! let class = err.classify();
//! assert_eq!(class.code, ErrorCode::QuotaExceeded);
//! assert!(class.retryable);
//! assert_eq!(Provenance::Fallback.to_string(), "fallback");
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{ErrorClassification, ErrorCode, FallbackStrategy, MediaError, Result};
pub use ids::*;
pub use types::*;

//! sf-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other sf-* crates,
//! providing type-safe identifiers, a unified error type, media-domain
//! enums, and the immutable application configuration (including the
//! encoder preset tables) that is injected at startup.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;

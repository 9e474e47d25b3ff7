//! Domain layer types and invariants.

pub mod artifact;
pub mod content;
pub mod error;
pub mod geo;
pub mod grid;
pub mod jobs;
pub mod scalebar;
pub mod types;

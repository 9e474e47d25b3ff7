//! Application services: job brokering, status and the render pipeline.

pub mod error;
pub mod jobs;
pub mod render;
pub mod repos;
pub mod version;

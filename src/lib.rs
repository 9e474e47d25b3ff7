//! Render service for printable maps: content-addressed SVG/PNG/PDF
//! artifacts, deduplicated render jobs and grid/scalebar overlays.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;

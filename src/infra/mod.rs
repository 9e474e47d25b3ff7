//! Infrastructure adapters and runtime bootstrap.

pub mod artifacts;
pub mod error;
pub mod http;
pub mod maps;
pub mod telemetry;

//! Repository traits describing persistence adapters.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{artifact::VersionSelector, types::FileFormat};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Content-addressable artifact storage keyed by `(map_id, version, format)`.
#[async_trait]
pub trait ArtifactRepo: Send + Sync {
    async fn exists(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<bool, RepoError>;

    /// Persist an artifact atomically; readers never observe partial bytes.
    async fn write(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
        bytes: Bytes,
    ) -> Result<PathBuf, RepoError>;

    /// Point the `LATEST` alias at an existing versioned artifact.
    async fn update_latest(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<(), RepoError>;

    async fn read(
        &self,
        map_id: &str,
        version: &VersionSelector,
        format: FileFormat,
    ) -> Result<Option<Bytes>, RepoError>;

    /// Read by the `{dir}/{name}` path handed out in download URLs.
    async fn read_path(&self, dir: &str, name: &str) -> Result<Option<Bytes>, RepoError>;
}

/// Supplier of render content documents for a map.
#[async_trait]
pub trait MapSource: Send + Sync {
    async fn load(&self, map_id: &str) -> Result<Option<Value>, RepoError>;
}

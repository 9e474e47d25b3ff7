//! In-memory artifact repository for unit tests.

use std::{collections::HashMap, path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    application::repos::{ArtifactRepo, RepoError},
    domain::{
        artifact::{VersionSelector, artifact_dir, artifact_name},
        types::FileFormat,
    },
};

#[derive(Default)]
pub struct MemoryArtifacts {
    files: Mutex<HashMap<(String, String), Bytes>>,
}

impl MemoryArtifacts {
    pub fn insert(&self, map_id: &str, version: &str, format: FileFormat) {
        self.put(
            map_id,
            &VersionSelector::Exact(version.to_string()),
            format,
            Bytes::from_static(b"artifact"),
        );
    }

    fn put(&self, map_id: &str, version: &VersionSelector, format: FileFormat, bytes: Bytes) {
        self.files.lock().expect("files lock").insert(
            (artifact_dir(map_id), artifact_name(version, format)),
            bytes,
        );
    }

    fn get(&self, dir: &str, name: &str) -> Option<Bytes> {
        self.files
            .lock()
            .expect("files lock")
            .get(&(dir.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ArtifactRepo for MemoryArtifacts {
    async fn exists(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<bool, RepoError> {
        let name = artifact_name(&VersionSelector::Exact(version.to_string()), format);
        Ok(self.get(&artifact_dir(map_id), &name).is_some())
    }

    async fn write(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
        bytes: Bytes,
    ) -> Result<PathBuf, RepoError> {
        let selector = VersionSelector::Exact(version.to_string());
        self.put(map_id, &selector, format, bytes);
        Ok(PathBuf::from(artifact_dir(map_id)).join(artifact_name(&selector, format)))
    }

    async fn update_latest(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<(), RepoError> {
        let name = artifact_name(&VersionSelector::Exact(version.to_string()), format);
        let bytes = self
            .get(&artifact_dir(map_id), &name)
            .ok_or(RepoError::NotFound)?;
        self.put(map_id, &VersionSelector::Latest, format, bytes);
        Ok(())
    }

    async fn read(
        &self,
        map_id: &str,
        version: &VersionSelector,
        format: FileFormat,
    ) -> Result<Option<Bytes>, RepoError> {
        Ok(self.get(&artifact_dir(map_id), &artifact_name(version, format)))
    }

    async fn read_path(&self, dir: &str, name: &str) -> Result<Option<Bytes>, RepoError> {
        Ok(self.get(dir, name))
    }
}

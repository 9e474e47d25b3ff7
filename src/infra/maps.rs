//! Render content documents read from a directory of JSON files.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::application::repos::{MapSource, RepoError};

#[derive(Debug, Clone)]
pub struct DirectoryMapSource {
    root: PathBuf,
}

impl DirectoryMapSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, map_id: &str) -> Result<PathBuf, RepoError> {
        let invalid = map_id.is_empty()
            || map_id.contains(['/', '\\'])
            || map_id.contains("..")
            || map_id.starts_with('.');
        if invalid {
            return Err(RepoError::invalid_input(format!("invalid map id `{map_id}`")));
        }
        Ok(self.root.join(format!("{map_id}.json")))
    }
}

#[async_trait]
impl MapSource for DirectoryMapSource {
    async fn load(&self, map_id: &str) -> Result<Option<Value>, RepoError> {
        let path = self.document_path(map_id)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RepoError::from_persistence(err)),
        };

        serde_json::from_slice(&raw).map(Some).map_err(|err| {
            RepoError::invalid_input(format!("map `{map_id}` is not valid JSON: {err}"))
        })
    }
}

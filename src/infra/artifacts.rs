//! Filesystem-backed content-addressable artifact storage.

use std::{
    fs::File,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::{
    application::repos::{ArtifactRepo, RepoError},
    domain::{
        artifact::{
            VersionSelector, artifact_dir, artifact_name, parse_artifact_name, validate_version,
        },
        types::FileFormat,
    },
};

/// Suffix of the index record used where symlinks are unavailable.
#[cfg_attr(unix, allow(dead_code))]
const INDEX_SUFFIX: &str = ".ref";

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("invalid artifact path")]
    InvalidPath,
    #[error("artifact `{path}` does not exist")]
    Missing { path: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("artifact write task aborted: {0}")]
    Aborted(String),
}

impl From<ArtifactStoreError> for RepoError {
    fn from(err: ArtifactStoreError) -> Self {
        match err {
            ArtifactStoreError::InvalidPath => RepoError::invalid_input("invalid artifact path"),
            ArtifactStoreError::Missing { .. } => RepoError::NotFound,
            other => RepoError::from_persistence(other),
        }
    }
}

/// Artifacts live at `{root}/{sha256(map_id)}/{version}[_{size}].{ext}`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact; `LATEST` resolves to the alias itself.
    pub fn path_for(&self, map_id: &str, version: &VersionSelector, format: FileFormat) -> PathBuf {
        self.root
            .join(artifact_dir(map_id))
            .join(artifact_name(version, format))
    }

    /// Validate a `{dir}/{name}` pair handed in from a download URL.
    fn resolve(
        &self,
        dir: &str,
        name: &str,
    ) -> Result<(VersionSelector, FileFormat), ArtifactStoreError> {
        let dir_valid = dir.len() == 64
            && dir
                .bytes()
                .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));
        if !dir_valid {
            return Err(ArtifactStoreError::InvalidPath);
        }
        parse_artifact_name(name).ok_or(ArtifactStoreError::InvalidPath)
    }

    async fn read_in(
        &self,
        dir: &str,
        version: &VersionSelector,
        format: FileFormat,
    ) -> Result<Option<Bytes>, ArtifactStoreError> {
        let directory = self.root.join(dir);
        let path = match version {
            VersionSelector::Exact(_) => directory.join(artifact_name(version, format)),
            VersionSelector::Latest => match latest_target(&directory, format).await? {
                Some(path) => path,
                None => return Ok(None),
            },
        };

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ArtifactStoreError::Io(err)),
        }
    }
}

#[async_trait]
impl ArtifactRepo for ArtifactStore {
    async fn exists(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<bool, RepoError> {
        validate_version(version).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let path = self.path_for(map_id, &VersionSelector::Exact(version.to_string()), format);
        fs::try_exists(&path)
            .await
            .map_err(|err| ArtifactStoreError::Io(err).into())
    }

    async fn write(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
        bytes: Bytes,
    ) -> Result<PathBuf, RepoError> {
        validate_version(version).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let started_at = Instant::now();
        let target = self.path_for(map_id, &VersionSelector::Exact(version.to_string()), format);
        let size = bytes.len();

        let path =
            tokio::task::spawn_blocking(move || write_atomic(&target, &bytes).map(|()| target))
                .await
                .map_err(|err| ArtifactStoreError::Aborted(err.to_string()))??;

        info!(
            target = "kartenwerk::store",
            op = "write",
            map_id,
            version,
            file_type = %format,
            bytes = size,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            path = %path.display(),
            "Artifact written"
        );
        Ok(path)
    }

    async fn update_latest(
        &self,
        map_id: &str,
        version: &str,
        format: FileFormat,
    ) -> Result<(), RepoError> {
        validate_version(version).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let directory = self.root.join(artifact_dir(map_id));
        let version = version.to_string();
        let target_name = artifact_name(&VersionSelector::Exact(version.clone()), format);
        let alias_name = artifact_name(&VersionSelector::Latest, format);

        tokio::task::spawn_blocking(move || {
            if !directory.join(&target_name).exists() {
                return Err(ArtifactStoreError::Missing { path: target_name });
            }
            point_latest(&directory, &target_name, &alias_name)
        })
        .await
        .map_err(|err| ArtifactStoreError::Aborted(err.to_string()))??;

        debug!(
            target = "kartenwerk::store",
            op = "update_latest",
            map_id,
            version = %version,
            file_type = %format,
            "Latest alias updated"
        );
        Ok(())
    }

    async fn read(
        &self,
        map_id: &str,
        version: &VersionSelector,
        format: FileFormat,
    ) -> Result<Option<Bytes>, RepoError> {
        if let VersionSelector::Exact(version) = version {
            if validate_version(version).is_err() {
                return Ok(None);
            }
        }
        Ok(self.read_in(&artifact_dir(map_id), version, format).await?)
    }

    async fn read_path(&self, dir: &str, name: &str) -> Result<Option<Bytes>, RepoError> {
        let (version, format) = match self.resolve(dir, name) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(None),
        };
        Ok(self.read_in(dir, &version, format).await?)
    }
}

/// Temp file in the target directory, fsync, rename over the target, then
/// fsync the directory so the rename survives a crash.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ArtifactStoreError> {
    let directory = target.parent().ok_or(ArtifactStoreError::InvalidPath)?;
    std::fs::create_dir_all(directory)?;

    let mut file = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(directory)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|err| ArtifactStoreError::Io(err.error))?;

    sync_directory(directory)
}

#[cfg(unix)]
fn sync_directory(directory: &Path) -> Result<(), ArtifactStoreError> {
    File::open(directory)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_directory: &Path) -> Result<(), ArtifactStoreError> {
    Ok(())
}

/// Replace the alias with a relative symlink created under a temporary name.
#[cfg(unix)]
fn point_latest(
    directory: &Path,
    target_name: &str,
    alias_name: &str,
) -> Result<(), ArtifactStoreError> {
    let staging = directory.join(format!(".{alias_name}.{}", uuid::Uuid::new_v4().simple()));
    std::os::unix::fs::symlink(target_name, &staging)?;
    if let Err(err) = std::fs::rename(&staging, directory.join(alias_name)) {
        let _ = std::fs::remove_file(&staging);
        return Err(err.into());
    }
    sync_directory(directory)
}

/// Without symlinks the alias is an index record naming the current file.
#[cfg(not(unix))]
fn point_latest(
    directory: &Path,
    target_name: &str,
    alias_name: &str,
) -> Result<(), ArtifactStoreError> {
    let record = directory.join(format!("{alias_name}{INDEX_SUFFIX}"));
    write_atomic(&record, target_name.as_bytes())
}

#[cfg(unix)]
async fn latest_target(
    directory: &Path,
    format: FileFormat,
) -> Result<Option<PathBuf>, ArtifactStoreError> {
    Ok(Some(directory.join(artifact_name(&VersionSelector::Latest, format))))
}

#[cfg(not(unix))]
async fn latest_target(
    directory: &Path,
    format: FileFormat,
) -> Result<Option<PathBuf>, ArtifactStoreError> {
    let alias_name = artifact_name(&VersionSelector::Latest, format);
    let record = directory.join(format!("{alias_name}{INDEX_SUFFIX}"));
    let target_name = match fs::read_to_string(&record).await {
        Ok(name) => name,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match parse_artifact_name(target_name.trim()) {
        Some((VersionSelector::Exact(_), parsed)) if parsed == format => {
            Ok(Some(directory.join(target_name.trim())))
        }
        _ => Err(ArtifactStoreError::InvalidPath),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::domain::types::PngSize;

    const V1: &str = "aaaa1111";
    const V2: &str = "bbbb2222";

    fn store() -> (TempDir, ArtifactStore) {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path().join("artifacts")).expect("store");
        (temp, store)
    }

    #[tokio::test]
    async fn write_then_read_by_version_and_path() {
        let (_temp, store) = store();
        let format = FileFormat::Png(PngSize::Small);
        let path = store
            .write("42", V1, format, Bytes::from_static(b"png-bytes"))
            .await
            .expect("write");
        assert!(path.ends_with(format!("{}/{V1}_small.png", artifact_dir("42"))));
        assert!(store.exists("42", V1, format).await.expect("exists"));
        assert!(!store.exists("42", V1, FileFormat::Svg).await.expect("exists"));

        let by_version = store
            .read("42", &VersionSelector::Exact(V1.to_string()), format)
            .await
            .expect("read");
        assert_eq!(by_version.as_deref(), Some(&b"png-bytes"[..]));

        let by_path = store
            .read_path(&artifact_dir("42"), &format!("{V1}_small.png"))
            .await
            .expect("read path");
        assert_eq!(by_path.as_deref(), Some(&b"png-bytes"[..]));
    }

    #[tokio::test]
    async fn no_partial_files_remain_after_write() {
        let (_temp, store) = store();
        store
            .write("42", V1, FileFormat::Svg, Bytes::from(vec![b'x'; 64 * 1024]))
            .await
            .expect("write");

        let directory = store.root().join(artifact_dir("42"));
        let names: Vec<String> = std::fs::read_dir(&directory)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{V1}.svg")]);
        let size = std::fs::metadata(directory.join(format!("{V1}.svg")))
            .expect("metadata")
            .len();
        assert_eq!(size, 64 * 1024);
    }

    #[tokio::test]
    async fn latest_follows_the_most_recent_update() {
        let (_temp, store) = store();
        store
            .write("42", V1, FileFormat::Pdf, Bytes::from_static(b"first"))
            .await
            .expect("write");
        store.update_latest("42", V1, FileFormat::Pdf).await.expect("latest");
        store
            .write("42", V2, FileFormat::Pdf, Bytes::from_static(b"second"))
            .await
            .expect("write");
        store.update_latest("42", V2, FileFormat::Pdf).await.expect("latest");

        let latest = store
            .read("42", &VersionSelector::Latest, FileFormat::Pdf)
            .await
            .expect("read");
        assert_eq!(latest.as_deref(), Some(&b"second"[..]));

        let by_path = store
            .read_path(&artifact_dir("42"), "LATEST.pdf")
            .await
            .expect("read path");
        assert_eq!(by_path.as_deref(), Some(&b"second"[..]));

        // Versioned artifacts are untouched by the alias.
        let first = store
            .read("42", &VersionSelector::Exact(V1.to_string()), FileFormat::Pdf)
            .await
            .expect("read");
        assert_eq!(first.as_deref(), Some(&b"first"[..]));
    }

    #[tokio::test]
    async fn latest_requires_an_existing_artifact() {
        let (_temp, store) = store();
        let err = store
            .update_latest("42", V1, FileFormat::Svg)
            .await
            .expect_err("missing artifact");
        assert!(matches!(err, RepoError::NotFound));
        let latest = store
            .read("42", &VersionSelector::Latest, FileFormat::Svg)
            .await
            .expect("read");
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn rewriting_the_same_version_is_harmless() {
        let (_temp, store) = store();
        for _ in 0..2 {
            store
                .write("42", V1, FileFormat::Svg, Bytes::from_static(b"<svg/>"))
                .await
                .expect("write");
        }
        let stored = store
            .read("42", &VersionSelector::Exact(V1.to_string()), FileFormat::Svg)
            .await
            .expect("read");
        assert_eq!(stored.as_deref(), Some(&b"<svg/>"[..]));
    }

    #[tokio::test]
    async fn traversal_and_malformed_names_resolve_to_nothing() {
        let (_temp, store) = store();
        assert!(store.read_path("..", "x.svg").await.expect("read").is_none());
        assert!(
            store
                .read_path(&artifact_dir("42"), "../../etc/passwd")
                .await
                .expect("read")
                .is_none()
        );
        assert!(
            store
                .read_path(&artifact_dir("42"), &format!("{V1}.jpg"))
                .await
                .expect("read")
                .is_none()
        );
        assert!(
            store
                .write("42", "../evil", FileFormat::Svg, Bytes::new())
                .await
                .is_err()
        );
    }
}

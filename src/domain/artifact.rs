//! Content-addressable artifact naming.
//!
//! `dir = sha256(map_id)`, `name = {version}[_{size}].{ext}`; the moving
//! alias uses `LATEST` in place of the version.

use std::fmt;

use sha2::{Digest, Sha256};

use super::{error::DomainError, types::FileFormat};

pub const LATEST: &str = "LATEST";

/// Which artifact of a map/format pair is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    Exact(String),
    Latest,
}

impl VersionSelector {
    pub fn as_str(&self) -> &str {
        match self {
            VersionSelector::Exact(version) => version.as_str(),
            VersionSelector::Latest => LATEST,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory component for a map: lowercase hex sha256 of the map id.
pub fn artifact_dir(map_id: &str) -> String {
    hex::encode(Sha256::digest(map_id.as_bytes()))
}

pub fn artifact_name(version: &VersionSelector, format: FileFormat) -> String {
    match format.size_suffix() {
        Some(size) => format!("{version}_{size}.{}", format.extension()),
        None => format!("{version}.{}", format.extension()),
    }
}

/// `{dir}/{name}` relative to the artifact root, as used in download URLs.
pub fn artifact_path(map_id: &str, version: &VersionSelector, format: FileFormat) -> String {
    format!("{}/{}", artifact_dir(map_id), artifact_name(version, format))
}

/// Versions are lowercase hex digests; anything else cannot name an artifact.
pub fn validate_version(version: &str) -> Result<(), DomainError> {
    let valid = !version.is_empty()
        && version.len() <= 128
        && version
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));
    if valid {
        Ok(())
    } else {
        Err(DomainError::not_found("version"))
    }
}

/// Parse a stored file name back into its selector and format.
pub fn parse_artifact_name(name: &str) -> Option<(VersionSelector, FileFormat)> {
    let (stem, extension) = name.rsplit_once('.')?;
    let (version, size) = match stem.split_once('_') {
        Some((version, size)) => (version, Some(size)),
        None => (stem, None),
    };

    let wire = match size {
        Some(size) => format!("{extension}:{size}"),
        None => extension.to_string(),
    };
    let format: FileFormat = wire.parse().ok()?;
    if format.extension() != extension {
        return None;
    }

    let selector = if version == LATEST {
        VersionSelector::Latest
    } else {
        validate_version(version).ok()?;
        VersionSelector::Exact(version.to_string())
    };
    Some((selector, format))
}

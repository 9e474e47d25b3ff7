//! API handlers organized by resource type.

mod geometry;
mod jobs;

pub use geometry::*;
pub use jobs::*;

use crate::domain::types::{FileFormat, FileFormatError};

use super::error::ApiError;

/// Parse a wire `file_type` once at the boundary.
pub(crate) fn parse_file_type(raw: &str) -> Result<FileFormat, ApiError> {
    raw.parse()
        .map_err(|err: FileFormatError| ApiError::invalid_format(err.to_string()))
}

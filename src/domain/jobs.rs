use std::{fmt, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    error::DomainError,
    types::{FileFormat, JobState},
};

/// Map ids name the artifact directory verbatim, so they are taken as sent:
/// empty ids and ids with surrounding whitespace are rejected.
pub fn validate_map_id(map_id: &str) -> Result<(), DomainError> {
    let reason = if map_id.is_empty() {
        "must not be empty"
    } else if map_id.trim() != map_id {
        "must not start or end with whitespace"
    } else {
        return Ok(());
    };
    Err(DomainError::InvalidMapId {
        map_id: map_id.to_string(),
        reason,
    })
}

/// The `(map_id, version, format)` tuple a render job produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub map_id: String,
    pub version: String,
    pub format: FileFormat,
}

impl JobKey {
    pub fn new(map_id: impl Into<String>, version: impl Into<String>, format: FileFormat) -> Self {
        Self {
            map_id: map_id.into(),
            version: version.into(),
            format,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.map_id, self.version, self.format)
    }
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub key: JobKey,
    /// Content document including the embedded grid; shared, never mutated.
    pub content: Arc<Value>,
    pub state: JobState,
    pub created_at: OffsetDateTime,
    pub started_at: Option<OffsetDateTime>,
    pub ended_at: Option<OffsetDateTime>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn queued(key: JobKey, content: Arc<Value>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            content,
            state: JobState::Queued,
            created_at: now,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

use thiserror::Error;

use super::types::{FileFormatError, JobState};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("invalid render content: {message}")]
    InvalidContent { message: String },
    #[error("invalid map id `{map_id}`: {reason}")]
    InvalidMapId {
        map_id: String,
        reason: &'static str,
    },
    #[error(transparent)]
    InvalidFormat(#[from] FileFormatError),
    #[error("illegal job transition from `{from}` to `{to}`")]
    IllegalTransition { from: &'static str, to: &'static str },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    pub fn illegal_transition(from: JobState, to: JobState) -> Self {
        Self::IllegalTransition {
            from: from.as_str(),
            to: to.as_str(),
        }
    }

    /// Caller errors surface synchronously as `400`.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidContent { .. }
                | DomainError::InvalidMapId { .. }
                | DomainError::InvalidFormat(_)
        )
    }
}

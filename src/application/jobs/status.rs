//! Job status resolution by id or by `(map_id, version, format)` tuple.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{error::AppError, repos::ArtifactRepo},
    domain::{
        artifact::{VersionSelector, artifact_path, validate_version},
        error::DomainError,
        jobs::{JobKey, JobRecord},
        types::JobState,
    },
};

use super::store::JobStore;

/// What a caller sees of a job, or of a satisfied tuple without a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: Option<Uuid>,
    pub state: JobState,
    pub key: JobKey,
    pub created_at: Option<OffsetDateTime>,
    /// `{dir}/{name}` relative to the artifact root; set for finished jobs.
    pub artifact_path: Option<String>,
    pub error: Option<String>,
}

impl JobView {
    pub fn from_record(record: &JobRecord) -> Self {
        let artifact_path = (record.state == JobState::Finished).then(|| {
            artifact_path(
                &record.key.map_id,
                &VersionSelector::Exact(record.key.version.clone()),
                record.key.format,
            )
        });
        Self {
            job_id: Some(record.id),
            state: record.state,
            key: record.key.clone(),
            created_at: Some(record.created_at),
            artifact_path,
            error: record.error.clone(),
        }
    }

    /// An artifact exists for the tuple; `job` is attached when still retained.
    pub fn satisfied(key: JobKey, job: Option<&JobRecord>) -> Self {
        let artifact_path = artifact_path(
            &key.map_id,
            &VersionSelector::Exact(key.version.clone()),
            key.format,
        );
        Self {
            job_id: job.map(|record| record.id),
            state: JobState::Finished,
            created_at: job.map(|record| record.created_at),
            key,
            artifact_path: Some(artifact_path),
            error: None,
        }
    }
}

/// Read-only status queries over the job store and artifact store.
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactRepo>,
}

impl StatusTracker {
    pub fn new(store: Arc<JobStore>, artifacts: Arc<dyn ArtifactRepo>) -> Self {
        Self { store, artifacts }
    }

    pub fn by_id(&self, job_id: Uuid) -> Result<JobView, AppError> {
        self.store
            .get(job_id)
            .map(|record| JobView::from_record(&record))
            .ok_or_else(|| DomainError::not_found("job").into())
    }

    /// Queued, started and finished registries first, then the artifact
    /// store. A failed job only answers when nothing better exists.
    pub async fn by_key(&self, key: JobKey) -> Result<JobView, AppError> {
        validate_version(&key.version)?;

        if let Some(record) = self.store.find(&key, JobState::Queued) {
            return Ok(JobView::from_record(&record));
        }
        if let Some(record) = self.store.find(&key, JobState::Started) {
            return Ok(JobView::from_record(&record));
        }

        let exists = self
            .artifacts
            .exists(&key.map_id, &key.version, key.format)
            .await?;
        if exists {
            let finished = self.store.find(&key, JobState::Finished);
            return Ok(JobView::satisfied(key, finished.as_ref()));
        }

        if let Some(record) = self.store.find(&key, JobState::Failed) {
            return Ok(JobView::from_record(&record));
        }

        Err(DomainError::not_found("job").into())
    }
}

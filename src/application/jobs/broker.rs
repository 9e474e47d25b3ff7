//! Submission of render requests with best-effort deduplication.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::info;

use crate::{
    application::{error::AppError, repos::ArtifactRepo, version::version_of},
    domain::{
        content::MapContent,
        error::DomainError,
        grid::{Grid, GridCells, GridStyle},
        jobs::{JobKey, validate_map_id},
        types::{FileFormat, JobState},
    },
};

use super::{status::JobView, store::JobStore};

const METRIC_JOBS_ENQUEUED: &str = "kartenwerk_jobs_enqueued_total";
const METRIC_JOBS_DEDUPLICATED: &str = "kartenwerk_jobs_deduplicated_total";

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub map_id: String,
    pub content: Value,
    pub format: FileFormat,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub job: JobView,
    /// The artifact already existed; no work was scheduled.
    pub already_satisfied: bool,
}

/// Content document ready for hashing, with the grid embedded.
#[derive(Debug, Clone)]
pub struct PreparedContent {
    pub document: Value,
    pub version: String,
}

pub struct JobBroker {
    store: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactRepo>,
    grid_style: GridStyle,
}

impl JobBroker {
    pub fn new(
        store: Arc<JobStore>,
        artifacts: Arc<dyn ArtifactRepo>,
        grid_style: GridStyle,
    ) -> Self {
        Self {
            store,
            artifacts,
            grid_style,
        }
    }

    /// Validate the document and embed a generated grid when it has none.
    /// The version is computed afterwards, so it covers the grid.
    pub fn prepare(&self, content: Value) -> Result<PreparedContent, DomainError> {
        let parsed = MapContent::from_value(&content)?;
        let mut document = content;

        let has_grid = document.get("grid").is_some_and(|grid| !grid.is_null());
        if !has_grid {
            let cells = GridCells::for_bbox(&parsed.bbox);
            let grid = Grid::generate(parsed.bbox, cells, self.grid_style).to_feature_collection();
            let grid = serde_json::to_value(grid)
                .map_err(|err| DomainError::invalid_content(err.to_string()))?;
            if let Some(object) = document.as_object_mut() {
                object.insert("grid".to_string(), grid);
            }
        }

        let version = version_of(&document);
        Ok(PreparedContent { document, version })
    }

    pub async fn submit(&self, request: RenderRequest) -> Result<SubmitOutcome, AppError> {
        validate_map_id(&request.map_id)?;

        let prepared = self.prepare(request.content)?;
        let key = JobKey::new(request.map_id, prepared.version, request.format);

        if !request.force {
            if let Some(outcome) = self.find_existing(&key).await? {
                counter!(METRIC_JOBS_DEDUPLICATED).increment(1);
                let result = if outcome.already_satisfied {
                    "artifact_hit"
                } else {
                    "in_flight_hit"
                };
                info!(
                    target = "kartenwerk::broker",
                    map_id = %key.map_id,
                    version = %key.version,
                    file_type = %key.format,
                    job_id = ?outcome.job.job_id,
                    result,
                    "Render request deduplicated"
                );
                return Ok(outcome);
            }
        }

        let record = self.store.enqueue(key, Arc::new(prepared.document));
        counter!(METRIC_JOBS_ENQUEUED).increment(1);
        info!(
            target = "kartenwerk::broker",
            map_id = %record.key.map_id,
            version = %record.key.version,
            file_type = %record.key.format,
            job_id = %record.id,
            force = request.force,
            result = "enqueued",
            "Render job enqueued"
        );

        Ok(SubmitOutcome {
            job: JobView::from_record(&record),
            already_satisfied: false,
        })
    }

    /// A stored artifact wins over in-flight work; failed jobs never match.
    async fn find_existing(&self, key: &JobKey) -> Result<Option<SubmitOutcome>, AppError> {
        if self
            .artifacts
            .exists(&key.map_id, &key.version, key.format)
            .await?
        {
            let finished = self.store.find(key, JobState::Finished);
            return Ok(Some(SubmitOutcome {
                job: JobView::satisfied(key.clone(), finished.as_ref()),
                already_satisfied: true,
            }));
        }

        let in_flight = self
            .store
            .jobs_for(key)
            .into_iter()
            .rev()
            .find(|record| matches!(record.state, JobState::Queued | JobState::Started));

        Ok(in_flight.map(|record| SubmitOutcome {
            job: JobView::from_record(&record),
            already_satisfied: false,
        }))
    }
}

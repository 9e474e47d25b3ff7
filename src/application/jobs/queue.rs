use std::time::Duration;

use tokio::time::{Instant, sleep};
use uuid::Uuid;

use crate::{
    application::error::AppError,
    domain::{error::DomainError, jobs::JobRecord, types::JobState},
};

use super::store::JobStore;

const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Block until the job finishes or the timeout elapses, returning the final job snapshot.
pub async fn wait_for_job_completion(
    store: &JobStore,
    job_id: Uuid,
    timeout: Duration,
) -> Result<JobRecord, AppError> {
    let deadline = Instant::now() + timeout;

    loop {
        let job = store
            .get(job_id)
            .ok_or_else(|| AppError::from(DomainError::not_found("job")))?;

        match job.state {
            JobState::Finished => return Ok(job),
            JobState::Failed => {
                let message = job
                    .error
                    .unwrap_or_else(|| "job failed without error text".to_string());
                return Err(AppError::unexpected(message));
            }
            JobState::Queued | JobState::Started => {
                if Instant::now() >= deadline {
                    return Err(AppError::unexpected(format!(
                        "job `{job_id}` timed out after {timeout:?}"
                    )));
                }

                sleep(DEFAULT_WAIT_POLL_INTERVAL).await;
            }
        }
    }
}

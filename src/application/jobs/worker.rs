//! Render workers and the retention reaper.

use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{error, info, warn};

use crate::{
    application::error::AppError,
    domain::{content::MapContent, jobs::JobRecord},
};

use super::{context::JobWorkerContext, store::JobStore};

const METRIC_JOBS_FINISHED: &str = "kartenwerk_jobs_finished_total";
const METRIC_JOBS_FAILED: &str = "kartenwerk_jobs_failed_total";
const METRIC_JOBS_REAPED: &str = "kartenwerk_jobs_reaped_total";
const METRIC_RENDER_MS: &str = "kartenwerk_render_ms";

/// Spawn `concurrency` workers pulling from the shared queue.
pub fn spawn_workers(context: JobWorkerContext, concurrency: usize) -> Vec<JoinHandle<()>> {
    (0..concurrency.max(1))
        .map(|worker| {
            let context = context.clone();
            tokio::spawn(async move {
                loop {
                    let job = context.store.claim_next().await;
                    if let Err(err) = process_job(&context, job).await {
                        error!(
                            target = "kartenwerk::worker",
                            worker,
                            error = %err,
                            "Job bookkeeping failed"
                        );
                    }
                }
            })
        })
        .collect()
}

/// Run a claimed job to a terminal state and return the final record.
///
/// Render or storage errors mark the job failed; only bookkeeping errors
/// (unknown job, illegal transition) are returned.
pub async fn process_job(
    context: &JobWorkerContext,
    job: JobRecord,
) -> Result<JobRecord, AppError> {
    let started_at = Instant::now();

    match execute(context, &job).await {
        Ok(path) => {
            let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
            histogram!(METRIC_RENDER_MS).record(elapsed_ms);
            counter!(METRIC_JOBS_FINISHED).increment(1);

            let record = context.store.finish(job.id)?;
            info!(
                target = "kartenwerk::worker",
                job_id = %job.id,
                map_id = %job.key.map_id,
                version = %job.key.version,
                file_type = %job.key.format,
                path = %path.display(),
                elapsed_ms = elapsed_ms as u64,
                result = "finished",
                "Render job finished"
            );
            Ok(record)
        }
        Err(err) => {
            counter!(METRIC_JOBS_FAILED).increment(1);
            warn!(
                target = "kartenwerk::worker",
                job_id = %job.id,
                map_id = %job.key.map_id,
                version = %job.key.version,
                file_type = %job.key.format,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                result = "failed",
                error = %err,
                "Render job failed"
            );
            Ok(context.store.fail(job.id, err.to_string())?)
        }
    }
}

async fn execute(context: &JobWorkerContext, job: &JobRecord) -> Result<PathBuf, AppError> {
    let content = MapContent::from_value(&job.content)?;
    let key = &job.key;

    let bytes = context.renderer.render(content, key.format).await?;
    let path = context
        .artifacts
        .write(&key.map_id, &key.version, key.format, Bytes::from(bytes))
        .await?;

    if let Err(err) = context
        .artifacts
        .update_latest(&key.map_id, &key.version, key.format)
        .await
    {
        warn!(
            target = "kartenwerk::worker",
            job_id = %job.id,
            map_id = %key.map_id,
            file_type = %key.format,
            error = %err,
            "Failed to update latest alias"
        );
    }

    Ok(path)
}

/// Periodically drop terminal jobs older than `retention`.
pub fn spawn_reaper(
    store: Arc<JobStore>,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = store.reap(OffsetDateTime::now_utc(), retention);
            if reaped > 0 {
                counter!(METRIC_JOBS_REAPED).increment(reaped as u64);
                info!(
                    target = "kartenwerk::store",
                    reaped,
                    "Expired jobs removed"
                );
            }
        }
    })
}

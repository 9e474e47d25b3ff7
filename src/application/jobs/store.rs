//! In-process job bookkeeping: records, per-tuple index and FIFO queue.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use dashmap::DashMap;
use metrics::gauge;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    error::DomainError,
    jobs::{JobKey, JobRecord},
    types::JobState,
};

const METRIC_QUEUE_DEPTH: &str = "kartenwerk_queue_depth";

/// Shared queue and registries for render jobs.
///
/// Records live in a concurrent map; `by_key` lists job ids per tuple in
/// creation order. The queue only holds ids of `Queued` jobs.
#[derive(Default)]
pub struct JobStore {
    records: DashMap<Uuid, JobRecord>,
    by_key: DashMap<JobKey, Vec<Uuid>>,
    queue: Mutex<VecDeque<Uuid>>,
    notify: Notify,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, key: JobKey, content: Arc<Value>) -> JobRecord {
        let record = JobRecord::queued(key, content, OffsetDateTime::now_utc());
        let id = record.id;

        self.records.insert(id, record.clone());
        self.by_key.entry(record.key.clone()).or_default().push(id);

        let depth = {
            let mut queue = self.lock_queue();
            queue.push_back(id);
            queue.len()
        };
        gauge!(METRIC_QUEUE_DEPTH).set(depth as f64);
        self.notify.notify_one();

        record
    }

    /// Wait until a queued job is available and move it to `Started`.
    pub async fn claim_next(&self) -> JobRecord {
        loop {
            if let Some(record) = self.try_claim() {
                return record;
            }
            self.notify.notified().await;
        }
    }

    pub fn try_claim(&self) -> Option<JobRecord> {
        loop {
            let (id, depth) = {
                let mut queue = self.lock_queue();
                let id = queue.pop_front()?;
                (id, queue.len())
            };
            gauge!(METRIC_QUEUE_DEPTH).set(depth as f64);

            let Some(mut record) = self.records.get_mut(&id) else {
                continue;
            };
            if record.state != JobState::Queued {
                warn!(
                    target = "kartenwerk::store",
                    job_id = %id,
                    state = record.state.as_str(),
                    "Skipping queue entry for job that is no longer queued"
                );
                continue;
            }
            record.state = JobState::Started;
            record.started_at = Some(OffsetDateTime::now_utc());
            return Some(record.clone());
        }
    }

    pub fn finish(&self, id: Uuid) -> Result<JobRecord, DomainError> {
        self.transition(id, JobState::Finished, None)
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<JobRecord, DomainError> {
        self.transition(id, JobState::Failed, Some(error.into()))
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.records.get(&id).map(|record| record.clone())
    }

    /// Newest job for the tuple in the given state.
    pub fn find(&self, key: &JobKey, state: JobState) -> Option<JobRecord> {
        self.jobs_for(key)
            .into_iter()
            .rev()
            .find(|record| record.state == state)
    }

    /// Jobs for the tuple in creation order.
    pub fn jobs_for(&self, key: &JobKey) -> Vec<JobRecord> {
        let ids = match self.by_key.get(key) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    pub fn queue_depth(&self) -> usize {
        self.lock_queue().len()
    }

    /// Drop terminal jobs that ended before `now - retention`. Returns the
    /// number of removed records.
    pub fn reap(&self, now: OffsetDateTime, retention: Duration) -> usize {
        let cutoff = now - retention;
        let expired: Vec<(Uuid, JobKey)> = self
            .records
            .iter()
            .filter(|record| {
                record.state.is_terminal()
                    && record.ended_at.is_some_and(|ended_at| ended_at <= cutoff)
            })
            .map(|record| (record.id, record.key.clone()))
            .collect();

        for (id, key) in &expired {
            self.records.remove(id);
            let now_empty = match self.by_key.get_mut(key) {
                Some(mut ids) => {
                    ids.retain(|candidate| candidate != id);
                    ids.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_key.remove_if(key, |_, ids| ids.is_empty());
            }
        }

        expired.len()
    }

    fn transition(
        &self,
        id: Uuid,
        next: JobState,
        error: Option<String>,
    ) -> Result<JobRecord, DomainError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("job"))?;

        if !record.state.can_transition_to(next) {
            return Err(DomainError::illegal_transition(record.state, next));
        }

        record.state = next;
        record.ended_at = Some(OffsetDateTime::now_utc());
        record.error = error;
        Ok(record.clone())
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Uuid>> {
        self.queue.lock().unwrap_or_else(|poisoned| {
            warn!(
                target = "kartenwerk::store",
                "Job queue lock poisoned; recovering"
            );
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::types::FileFormat;

    fn key(version: &str) -> JobKey {
        JobKey::new("7", version, FileFormat::Svg)
    }

    fn content() -> Arc<Value> {
        Arc::new(json!({"name": "Demo"}))
    }

    #[test]
    fn jobs_move_forward_through_the_lifecycle() {
        let store = JobStore::new();
        let queued = store.enqueue(key("aa"), content());
        assert_eq!(queued.state, JobState::Queued);
        assert_eq!(store.queue_depth(), 1);

        let started = store.try_claim().expect("claimed");
        assert_eq!(started.id, queued.id);
        assert_eq!(started.state, JobState::Started);
        assert!(started.started_at.is_some());
        assert_eq!(store.queue_depth(), 0);

        let finished = store.finish(queued.id).expect("finish");
        assert_eq!(finished.state, JobState::Finished);
        assert!(finished.ended_at.is_some());
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let store = JobStore::new();
        let job = store.enqueue(key("aa"), content());

        let err = store.finish(job.id).expect_err("queued job cannot finish");
        assert!(matches!(err, DomainError::IllegalTransition { .. }));

        store.try_claim().expect("claimed");
        let failed = store.fail(job.id, "backend crashed").expect("fail");
        assert_eq!(failed.error.as_deref(), Some("backend crashed"));

        assert!(store.finish(job.id).is_err());
        assert!(store.fail(job.id, "again").is_err());
        assert_eq!(store.get(job.id).expect("job").state, JobState::Failed);
    }

    #[test]
    fn unknown_jobs_are_not_found() {
        let store = JobStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(matches!(
            store.finish(Uuid::new_v4()),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn queue_is_fifo() {
        let store = JobStore::new();
        let first = store.enqueue(key("aa"), content());
        let second = store.enqueue(key("bb"), content());

        assert_eq!(store.try_claim().expect("first").id, first.id);
        assert_eq!(store.try_claim().expect("second").id, second.id);
        assert!(store.try_claim().is_none());
    }

    #[test]
    fn find_returns_newest_match_per_state() {
        let store = JobStore::new();
        let older = store.enqueue(key("aa"), content());
        let newer = store.enqueue(key("aa"), content());
        store.enqueue(key("bb"), content());

        assert_eq!(
            store.find(&key("aa"), JobState::Queued).expect("queued").id,
            newer.id
        );
        store.try_claim().expect("claim older");
        assert_eq!(
            store.find(&key("aa"), JobState::Started).expect("started").id,
            older.id
        );
        assert!(store.find(&key("aa"), JobState::Finished).is_none());
        assert_eq!(store.jobs_for(&key("aa")).len(), 2);
    }

    #[test]
    fn reap_drops_only_expired_terminal_jobs() {
        let store = JobStore::new();
        let done = store.enqueue(key("aa"), content());
        let waiting = store.enqueue(key("bb"), content());
        store.try_claim().expect("claim");
        store.finish(done.id).expect("finish");

        let retention = Duration::from_secs(500);
        let now = OffsetDateTime::now_utc();
        assert_eq!(store.reap(now, retention), 0);

        let later = now + Duration::from_secs(501);
        assert_eq!(store.reap(later, retention), 1);
        assert!(store.get(done.id).is_none());
        assert!(store.jobs_for(&key("aa")).is_empty());
        assert_eq!(store.get(waiting.id).expect("queued").state, JobState::Queued);
    }

    #[tokio::test]
    async fn claim_next_wakes_on_enqueue() {
        let store = Arc::new(JobStore::new());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.claim_next().await })
        };

        tokio::task::yield_now().await;
        let job = store.enqueue(key("aa"), content());

        let claimed = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("claim in time")
            .expect("join");
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.state, JobState::Started);
    }
}

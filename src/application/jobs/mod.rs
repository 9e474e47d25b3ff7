mod broker;
mod context;
mod queue;
mod status;
mod store;
#[cfg(test)]
mod testing;
mod worker;

pub use broker::{JobBroker, PreparedContent, RenderRequest, SubmitOutcome};
pub use context::{JobWorkerContext, RENDER_JOB_WAIT_TIMEOUT};
pub use queue::wait_for_job_completion;
pub use status::{JobView, StatusTracker};
pub use store::JobStore;
pub use worker::{process_job, spawn_reaper, spawn_workers};

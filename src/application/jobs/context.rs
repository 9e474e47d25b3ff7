use std::{sync::Arc, time::Duration};

use crate::application::{render::RenderPipeline, repos::ArtifactRepo};

use super::store::JobStore;

pub const RENDER_JOB_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared context passed to render workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub store: Arc<JobStore>,
    pub artifacts: Arc<dyn ArtifactRepo>,
    pub renderer: Arc<RenderPipeline>,
}

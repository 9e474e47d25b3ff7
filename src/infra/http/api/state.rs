use std::sync::Arc;

use url::Url;

use crate::application::jobs::{JobBroker, StatusTracker};
use crate::application::repos::MapSource;
use crate::domain::grid::GridStyle;

#[derive(Clone)]
pub struct ApiState {
    pub broker: Arc<JobBroker>,
    pub status: Arc<StatusTracker>,
    pub maps: Arc<dyn MapSource>,
    /// Base for download URLs; always ends with `/`.
    pub public_url: Url,
    pub grid_style: GridStyle,
}

use kartenwerk_api_types::{JobStatusResponse, SubmitRenderResponse};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::jobs::{JobView, SubmitOutcome};
use crate::domain::content::FeatureCollection;
use crate::domain::scalebar::Scalebar;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderQuery {
    pub file_type: Option<String>,
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub bbox: String,
    pub cells: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScalebarQuery {
    pub bbox: String,
    pub width: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ScalebarResponse {
    pub distance_m: f64,
    pub label: String,
    pub pixels_per_meter: f64,
    pub length_px: f64,
    pub geometry: FeatureCollection,
}

impl From<&Scalebar> for ScalebarResponse {
    fn from(scalebar: &Scalebar) -> Self {
        Self {
            distance_m: scalebar.distance_m,
            label: scalebar.end_label.clone(),
            pixels_per_meter: scalebar.pixels_per_meter,
            length_px: scalebar.length_px(),
            geometry: scalebar.to_feature_collection(),
        }
    }
}

pub fn job_view_to_api(view: JobView, public_url: &Url) -> JobStatusResponse {
    let download_url = view
        .artifact_path
        .as_deref()
        .and_then(|path| public_url.join(&format!("artifacts/{path}")).ok())
        .map(String::from);

    JobStatusResponse {
        job_id: view.job_id,
        status: view.state.into(),
        map_id: view.key.map_id,
        version: view.key.version,
        file_type: view.key.format.to_string(),
        created_at: view.created_at,
        download_url,
        error: view.error,
    }
}

pub fn submit_outcome_to_api(outcome: SubmitOutcome, public_url: &Url) -> SubmitRenderResponse {
    SubmitRenderResponse {
        job: job_view_to_api(outcome.job, public_url),
        already_satisfied: outcome.already_satisfied,
    }
}

#[cfg(test)]
mod tests {
    use kartenwerk_api_types::JobStatus;

    use super::*;
    use crate::domain::{
        artifact::artifact_dir,
        jobs::JobKey,
        types::{FileFormat, PngSize},
    };

    #[test]
    fn download_url_joins_public_base_and_artifact_path() {
        let key = JobKey::new("42", "abc", FileFormat::Png(PngSize::Large));
        let view = JobView::satisfied(key, None);
        let base = Url::parse("https://maps.example.org/render/").expect("url");

        let response = job_view_to_api(view, &base);
        assert_eq!(response.status, JobStatus::Finished);
        assert_eq!(response.file_type, "png:large");
        assert_eq!(
            response.download_url.as_deref(),
            Some(
                format!(
                    "https://maps.example.org/render/artifacts/{}/abc_large.png",
                    artifact_dir("42")
                )
                .as_str()
            )
        );
        assert!(response.job_id.is_none());
    }
}

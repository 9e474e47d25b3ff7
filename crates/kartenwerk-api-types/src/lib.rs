//! Wire types shared by the kartenwerk HTTP API and its clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state reported for a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// Status of a render job, addressed either by job id or by
/// `(map_id, version, file_type)`.
///
/// `job_id` is absent when the result was resolved from the artifact store
/// after the job itself left the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: JobStatus,
    pub map_id: String,
    pub version: String,
    pub file_type: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a render submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRenderResponse {
    #[serde(flatten)]
    pub job: JobStatusResponse,
    /// `true` when an existing artifact or in-flight job satisfied the request.
    pub already_satisfied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case_and_skips_empty_fields() {
        let response = JobStatusResponse {
            job_id: None,
            status: JobStatus::Finished,
            map_id: "m1".to_string(),
            version: "abc".to_string(),
            file_type: "png:small".to_string(),
            created_at: None,
            download_url: Some("http://localhost/artifacts/x/abc_small.png".to_string()),
            error: None,
        };

        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["status"], "finished");
        assert!(value.get("job_id").is_none());
        assert!(value.get("error").is_none());
        assert_eq!(value["file_type"], "png:small");
    }

    #[test]
    fn submit_response_flattens_job_fields() {
        let response = SubmitRenderResponse {
            job: JobStatusResponse {
                job_id: Some(Uuid::nil()),
                status: JobStatus::Queued,
                map_id: "m1".to_string(),
                version: "abc".to_string(),
                file_type: "svg".to_string(),
                created_at: None,
                download_url: None,
                error: None,
            },
            already_satisfied: false,
        };

        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["status"], "queued");
        assert_eq!(value["already_satisfied"], false);

        let parsed: SubmitRenderResponse = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, response);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Started.is_terminal());
    }
}

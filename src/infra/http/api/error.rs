use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_FORMAT: &str = "invalid_format";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const STORAGE: &str = "storage_error";
    pub const RENDER: &str = "render_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::INVALID_REQUEST, message, hint)
    }

    pub fn invalid_format(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_FORMAT,
            "Unsupported file type",
            Some(hint.into()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        let hint = Some(err.to_string());
        match err {
            AppError::Domain(DomainError::InvalidFormat(_)) => {
                Self::new(status, codes::INVALID_FORMAT, "Unsupported file type", hint)
            }
            AppError::Domain(DomainError::NotFound { entity }) => {
                Self::new(status, codes::NOT_FOUND, "Resource not found", Some(entity.to_string()))
            }
            AppError::Domain(DomainError::InvalidContent { .. })
            | AppError::Domain(DomainError::InvalidMapId { .. })
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => {
                Self::new(status, codes::INVALID_REQUEST, "Invalid render request", hint)
            }
            AppError::Domain(DomainError::IllegalTransition { .. }) => {
                Self::new(status, codes::CONFLICT, "Job state conflict", hint)
            }
            AppError::Repo(RepoError::NotFound) | AppError::NotFound => {
                Self::new(status, codes::NOT_FOUND, "Resource not found", None)
            }
            AppError::Repo(RepoError::Persistence(_)) | AppError::Infra(_) => {
                Self::new(status, codes::STORAGE, "Artifact storage failure", hint)
            }
            AppError::Render(_) => {
                Self::new(status, codes::RENDER, "Map could not be rendered", hint)
            }
            AppError::Unexpected(_) => {
                Self::new(status, codes::INTERNAL, "Unexpected error occurred", hint)
            }
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        AppError::from(err).into()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FileFormat;

    #[test]
    fn maps_application_errors_to_codes() {
        let invalid: ApiError = AppError::from(DomainError::from(
            "jpg".parse::<FileFormat>().expect_err("jpg"),
        ))
        .into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), codes::INVALID_FORMAT);

        let missing: ApiError = DomainError::not_found("job").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.code(), codes::NOT_FOUND);

        let storage: ApiError = RepoError::from_persistence("disk full").into();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.code(), codes::STORAGE);

        let content: ApiError = DomainError::invalid_content("missing bbox").into();
        assert_eq!(content.status(), StatusCode::BAD_REQUEST);
        assert_eq!(content.code(), codes::INVALID_REQUEST);
    }
}

use crate::application::audience::AudienceError;
use crate::application::delivery::DeliveryError;
use crate::application::drafts::DraftError;
use crate::application::error::ErrorReport;
use crate::application::preview::{PreviewError, PreviewSendError};
use crate::application::repos::RepoError;
use crate::application::summary::SummaryError;
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
    pub const BAD_REQUEST: &str = "bad_request";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const AUDIENCE_LIMIT: &str = "audience_limit";
    pub const HIDDEN_MEMBERSHIP: &str = "hidden_membership";
    pub const VALIDATION: &str = "validation_error";
    pub const DIRECTORY: &str = "directory_error";
    pub const QUEUE: &str = "queue_error";
    pub const PREVIEW: &str = "preview_failed";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
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
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn hidden_membership() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::HIDDEN_MEMBERSHIP,
            "Audience includes a group with hidden membership",
            None,
        )
    }

    fn internal(code: &'static str, message: &'static str, hint: String) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message, Some(hint))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let detail = format!("{}: {}", self.code, hint.as_deref().unwrap_or(&self.message));
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}

pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => {
            ApiError::internal(codes::REPO, "Persistence error", message)
        }
    }
}

fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation { message } => {
            ApiError::new(StatusCode::BAD_REQUEST, codes::VALIDATION, message, None)
        }
        DomainError::Invariant { message } => {
            ApiError::internal(codes::INTERNAL, "Invariant violated", message)
        }
    }
}

fn audience_to_api(err: AudienceError) -> ApiError {
    match err {
        AudienceError::Directory(err) => {
            ApiError::internal(codes::DIRECTORY, "Directory lookup failed", err.to_string())
        }
        AudienceError::Repo(err) => repo_to_api(err),
    }
}

fn limit_exceeded(message: String) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, codes::AUDIENCE_LIMIT, message, None)
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::MissingId => ApiError::bad_request(err.to_string(), None),
            DeliveryError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DeliveryError::AudienceLimit(message) => limit_exceeded(message),
            DeliveryError::HiddenMembership => ApiError::hidden_membership(),
            DeliveryError::Audience(err) => audience_to_api(err),
            DeliveryError::Repo(err) => repo_to_api(err),
            DeliveryError::Queue(err) => {
                ApiError::internal(codes::QUEUE, "Failed to enqueue delivery", err.to_string())
            }
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::MissingId => ApiError::bad_request(err.to_string(), None),
            DraftError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DraftError::AudienceLimit(message) => limit_exceeded(message),
            DraftError::HiddenMembership => ApiError::hidden_membership(),
            DraftError::Domain(err) => domain_to_api(err),
            DraftError::Audience(err) => audience_to_api(err),
            DraftError::Repo(err) => repo_to_api(err),
        }
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::MissingId => ApiError::bad_request(err.to_string(), None),
            SummaryError::NotFound { .. } => ApiError::not_found(err.to_string()),
            SummaryError::Audience(err) => audience_to_api(err),
            SummaryError::Repo(err) => repo_to_api(err),
        }
    }
}

impl From<PreviewError> for ApiError {
    fn from(err: PreviewError) -> Self {
        match err {
            // An unknown draft is a bad preview request rather than a missing resource.
            PreviewError::MissingField { .. } | PreviewError::NotFound { .. } => {
                ApiError::bad_request(err.to_string(), None)
            }
            PreviewError::Send(PreviewSendError::Rejected { status, message }) => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::PREVIEW,
                "Preview was rejected by the channel",
                Some(format!("status {status}: {message}")),
            ),
            PreviewError::Send(PreviewSendError::Unavailable(message)) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::PREVIEW,
                "Preview channel unavailable",
                Some(message),
            ),
            PreviewError::Repo(err) => repo_to_api(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::directory::DirectoryError;
    use crate::application::queues::QueueError;

    #[test]
    fn delivery_errors_map_to_statuses() {
        let cases = [
            (DeliveryError::MissingId, StatusCode::BAD_REQUEST),
            (
                DeliveryError::NotFound {
                    id: "ghost".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                DeliveryError::AudienceLimit("too many teams".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (DeliveryError::HiddenMembership, StatusCode::FORBIDDEN),
            (
                DeliveryError::Audience(AudienceError::Directory(DirectoryError::Unavailable(
                    "down".to_string(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DeliveryError::Repo(RepoError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                DeliveryError::Queue(QueueError {
                    queue: "prepare_to_send",
                    source: RepoError::Timeout,
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn not_found_message_names_the_draft() {
        let err = ApiError::from(DraftError::NotFound {
            id: "ghost".to_string(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.message,
            "Draft notification, Id: ghost, could not be found."
        );
    }

    #[test]
    fn validation_failures_are_client_errors() {
        let err = ApiError::from(DraftError::Domain(DomainError::validation("title required")));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::VALIDATION);

        let err = ApiError::from(SummaryError::Repo(RepoError::Timeout));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn preview_errors_map_to_statuses() {
        let err = ApiError::from(PreviewError::NotFound {
            id: "ghost".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Notification ghost not found.");

        let cases = [
            (
                PreviewError::MissingField {
                    field: "teamsTeamId",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                PreviewError::Send(PreviewSendError::Rejected {
                    status: 403,
                    message: "forbidden".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PreviewError::Send(PreviewSendError::Unavailable("down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn error_response_carries_report() {
        let response = ApiError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}

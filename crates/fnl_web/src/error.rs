use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fnl_core::ExtractionMetadata;
use fnl_scrappers::IngestError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a ExtractionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    article_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    article_text: Option<&'a str>,
}

/// What the user submitted, echoed back on a failed analysis so the form can
/// be filled in again.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub article_url: Option<String>,
    pub article_text: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Login required.")]
    Unauthorized,

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("{error}")]
    Ingest {
        error: IngestError,
        submission: Submission,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn ingest(error: IngestError, submission: Submission) -> Self {
        ApiError::Ingest { error, submission }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Ingest { error, .. } => match error {
                IngestError::Validation(_) => StatusCode::BAD_REQUEST,
                IngestError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                IngestError::Fetch { .. } => StatusCode::BAD_GATEWAY,
                IngestError::Model(_) => StatusCode::SERVICE_UNAVAILABLE,
                IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::Unauthorized | ApiError::InvalidCredentials => "auth",
            ApiError::Conflict(_) => "conflict",
            ApiError::Ingest { error, .. } => error.kind(),
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<fnl_core::Error> for ApiError {
    fn from(err: fnl_core::Error) -> Self {
        match err {
            fnl_core::Error::Conflict(message) => ApiError::Conflict(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("API internal error: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let (meta, article_url, article_text) = match &self {
            ApiError::Ingest { error, submission } => (
                error.metadata(),
                submission.article_url.as_deref(),
                submission.article_text.as_deref(),
            ),
            _ => (None, None, None),
        };

        let body = ErrorBody {
            kind: self.kind(),
            error,
            meta,
            article_url,
            article_text,
        };
        (status, Json(body)).into_response()
    }
}

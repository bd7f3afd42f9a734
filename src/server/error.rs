//! JSON error responses for the upload server.

use crate::error::OcrError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        let message = err.to_string();
        match err {
            OcrError::RasterizerUnavailable { binary, .. } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "RASTERIZER_UNAVAILABLE",
                message,
            )
            .with_details(serde_json::json!({ "binary": binary })),
            OcrError::DocumentCorrupt { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "DOCUMENT_CORRUPT", message)
            }
            OcrError::ModelNotConfigured { .. } => ApiError::unauthorized(message),
            OcrError::TranscriptionFailed { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, "MODEL_ERROR", message)
            }
            OcrError::InvalidConfig(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_OPTION", message)
            }
            OcrError::OutputRenderFailed { format, .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "RENDER_FAILED",
                message,
            )
            .with_details(serde_json::json!({ "format": format })),
            OcrError::PageConversionFailed { page, .. } => ApiError::internal(message)
                .with_details(serde_json::json!({ "page": page })),
            OcrError::Io { .. } | OcrError::Internal(_) => ApiError::internal(message),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::new(err.status(), "INVALID_UPLOAD", err.body_text())
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn ocr_errors_map_to_statuses() {
        let cases = [
            (
                OcrError::RasterizerUnavailable {
                    binary: "pdftoppm".into(),
                    guide: "install poppler".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                OcrError::DocumentCorrupt {
                    detail: "not a PDF".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                OcrError::InvalidConfig("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OcrError::TranscriptionFailed {
                    detail: "401".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn body_has_code_and_message() {
        let response = ApiError::from(OcrError::DocumentCorrupt {
            detail: "missing %PDF header".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "DOCUMENT_CORRUPT");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("missing %PDF header"));
        assert!(json["error"].get("details").is_none());
    }
}

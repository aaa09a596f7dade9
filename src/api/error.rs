//! HTTP rendering of crate errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Error;

/// Crate error returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::AssistantNotFound { .. }
            | Error::JobNotFound { .. }
            | Error::DirectoryNotFound { .. } => StatusCode::NOT_FOUND,
            Error::DirectoryNotAllowed { .. } | Error::FileOperationsDisabled => {
                StatusCode::FORBIDDEN
            }
            Error::SchedulerNotRunning | Error::BackendUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0.format_for_log(), "Request failed");
        }

        let body = json!({
            "error": {
                "code": self.0.code().as_str(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError(Error::JobNotFound { id: "x".to_string() });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad = ApiError(Error::invalid_schedule("whenever", "unrecognized"));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let internal = ApiError(Error::Internal("boom".to_string()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

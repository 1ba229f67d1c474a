//! Error-to-status mapping for the HTTP surface. The taxonomy maps each
//! error variant to exactly one status; bodies carry a machine-readable
//! `error` tag plus the human message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use mission_shared::MissionControlError;

#[derive(Debug)]
pub struct ApiError(pub MissionControlError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MissionControlError::Validation(_) => StatusCode::BAD_REQUEST,
            MissionControlError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MissionControlError::AccessDenied(_) => StatusCode::FORBIDDEN,
            MissionControlError::NotFound(_) => StatusCode::NOT_FOUND,
            MissionControlError::CollaboratorUnavailable(_) => StatusCode::BAD_GATEWAY,
            MissionControlError::CollaboratorContract(_)
            | MissionControlError::Messaging(_)
            | MissionControlError::Storage(_)
            | MissionControlError::Configuration(_)
            | MissionControlError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MissionControlError> for ApiError {
    fn from(e: MissionControlError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Handler failed");
        }
        let body = Json(json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                MissionControlError::Validation("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                MissionControlError::Unauthorized("x".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                MissionControlError::AccessDenied("x".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                MissionControlError::NotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                MissionControlError::CollaboratorUnavailable("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                MissionControlError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MissionControlError::Storage("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}

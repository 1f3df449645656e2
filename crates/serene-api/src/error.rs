use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use serene_types::api::ErrorResponse;

/// Every way a request can fail. Rendered as `{ "ok": false, "detail": .. }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing credential")]
    AuthenticationMissing,

    #[error("Invalid or unknown credential")]
    AuthenticationUnknown,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not a participant")]
    Forbidden,

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationMissing | Self::AuthenticationUnknown | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Database text stays in the log, never in the body.
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let body = ErrorResponse {
            ok: false,
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(ApiError::AuthenticationMissing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::AuthenticationUnknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("Conversation").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("User").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::validation("text required").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk I/O error")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_generic() {
        let err = ApiError::from(anyhow::anyhow!("no such table: users"));
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(ApiError::NotFound("User").to_string(), "User not found");
    }
}

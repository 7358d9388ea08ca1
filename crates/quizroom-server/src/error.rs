use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use quizroom_core::error::{ErrorKind, RoomError};

use crate::store::StoreError;

/// Failure of an orchestrator operation: a rule violation or a store fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Forbidden(m)
            | Self::Unauthorized(m)
            | Self::ServiceUnavailable(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Self::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RoomError> for AppError {
    fn from(e: RoomError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Forbidden => Self::Forbidden(message),
            ErrorKind::Unauthorized => Self::Unauthorized(message),
            ErrorKind::Invalid => Self::BadRequest(message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            other => {
                tracing::warn!(error = %other, "Store operation failed");
                Self::Internal("internal server error".to_string())
            },
        }
    }
}

impl From<ManagerError> for AppError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::Room(e) => e.into(),
            ManagerError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: impl Into<AppError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn room_errors_map_by_kind() {
        assert_eq!(status(RoomError::RoomNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(RoomError::NoQuestionsLeft), StatusCode::NOT_FOUND);
        assert_eq!(status(RoomError::RoomFull), StatusCode::FORBIDDEN);
        assert_eq!(status(RoomError::AlreadyAnswered), StatusCode::FORBIDDEN);
        assert_eq!(status(RoomError::UserNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(RoomError::Invalid("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_faults_are_internal() {
        assert_eq!(status(StoreError::NotFound("room")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Unavailable("disk".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(ManagerError::Store(StoreError::Conflict("x".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_message_is_generic() {
        let e: AppError = StoreError::Unavailable("secret path".to_string()).into();
        assert_eq!(e.to_string(), "internal server error");
    }
}

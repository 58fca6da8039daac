//! HTTP error mapping. Every error body is `{"message": "..."}`.

use automl_core::AutomlError;
use automl_state::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Automl(#[from] AutomlError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Automl(AutomlError::ArtifactNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Automl(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidFilter { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn status_mapping() {
        let missing = ApiError::from(AutomlError::ArtifactNotFound(PathBuf::from("w/iris")));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad_data = ApiError::from(AutomlError::DataPreparationFailed("empty".into()));
        assert_eq!(bad_data.status(), StatusCode::BAD_REQUEST);

        let record = ApiError::from(StorageError::NotFound {
            table: "datasets",
            id: 3,
        });
        assert_eq!(record.status(), StatusCode::NOT_FOUND);

        let backend = ApiError::from(StorageError::Backend("down".into()));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

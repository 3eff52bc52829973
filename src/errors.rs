use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Failures of the persistence layer that callers react to specifically.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("context for {user_id} was modified by another session")]
    StaleContext { user_id: String },

    #[error("seat {seat} is already reserved for {movie_key} at {showtime}")]
    SeatTaken {
        movie_key: String,
        showtime: String,
        seat: String,
    },

    #[error("could not generate a unique booking reference after {attempts} attempts")]
    ReferenceExhausted { attempts: usize },

    #[error("database lock poisoned")]
    Poisoned,
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum LoanError {
    #[error("{0}")]
    Validation(String),

    #[error("Loan not found")]
    NotFound,

    #[error("Loan has already been processed")]
    AlreadyProcessed,

    #[error("Access denied")]
    Forbidden,

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LoanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LoanError::Validation(_) | LoanError::AlreadyProcessed => StatusCode::BAD_REQUEST,
            LoanError::NotFound => StatusCode::NOT_FOUND,
            LoanError::Forbidden => StatusCode::FORBIDDEN,
            LoanError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for LoanError {
    fn into_response(self) -> Response {
        let message = match &self {
            LoanError::Storage(e) => {
                log::error!("loan storage failure: {}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(ErrorResponse { error: message })).into_response()
    }
}

//! Authentication error taxonomy and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure verifying or signing a token
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::SignatureInvalid,
            _ => TokenError::Malformed,
        }
    }
}

/// Errors raised by the session manager and the authorization gate
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("username already exists")]
    DuplicateUsername,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid username or email or password")]
    InvalidCredentials,

    #[error("user not verified")]
    NotVerified,

    #[error("authorization header missing or malformed")]
    Unauthenticated,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("token not found")]
    TokenNotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("notification failed: {0}")]
    Notifier(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::SignatureInvalid | TokenError::Malformed => AuthError::InvalidToken,
            TokenError::Signing(msg) => AuthError::Signing(msg),
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::DuplicateUsername | AuthError::DuplicateEmail => {
                StatusCode::BAD_REQUEST
            }
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::TokenNotFound => StatusCode::UNAUTHORIZED,
            AuthError::NotVerified | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Hashing(_)
            | AuthError::Storage(_)
            | AuthError::Notifier(_)
            | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of a collaborator (store, notifier, crypto backend)
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Message safe to return to the client
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Storage(_) => "internal storage error".to_string(),
            AuthError::Hashing(_) | AuthError::Signing(_) => "internal error".to_string(),
            AuthError::Notifier(_) => "failed to send email".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Forbidden = self {
            return StatusCode::FORBIDDEN.into_response();
        }
        if self.is_internal() {
            log::error!("{}", self);
        }
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::NotFound("user".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AuthError::TokenNotFound.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Notifier("smtp down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_error_conversion() {
        assert!(matches!(
            AuthError::from(TokenError::Expired),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            AuthError::from(TokenError::SignatureInvalid),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(TokenError::Malformed),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = AuthError::Notifier("relay 10.0.0.3 refused".into());
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_forbidden_has_no_body() {
        let response = AuthError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(axum::http::header::CONTENT_TYPE).is_none());
    }
}

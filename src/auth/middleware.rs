//! HTTP authorization gate
//!
//! Two chained stages: `require_auth` resolves the caller from a bearer
//! access token, `require_admin` then enforces the admin role. Neither
//! stage mutates stored state.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{
    database::AuthDatabase,
    error::AuthError,
    jwt::JwtManager,
    models::{AuthContext, Role, SessionState},
    routes::AuthState,
};

/// Key for the authorization header
pub const AUTH_HEADER: &str = "authorization";

/// Extract the bearer token from request headers
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Check a bearer token against the token store, then its own signature
/// and expiry.
pub fn validate_token(
    db: &AuthDatabase,
    jwt: &JwtManager,
    token: &str,
) -> Result<AuthContext, AuthError> {
    match db.session_state(token)? {
        SessionState::Missing => return Err(AuthError::TokenNotFound),
        SessionState::Expired => return Err(AuthError::TokenExpired),
        SessionState::Active => {}
    }

    let claims = jwt
        .verify_access(token)
        .map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthContext {
        id: claims.id,
        username: claims.username,
        role: claims.role,
    })
}

/// Authentication stage: resolve the caller or fail
pub fn authenticate_request(
    db: &AuthDatabase,
    jwt: &JwtManager,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::Unauthenticated)?;
    validate_token(db, jwt, token)
}

/// Authorization stage: only admins pass
pub fn authorize_admin(context: Option<&AuthContext>) -> Result<(), AuthError> {
    match context {
        Some(ctx) if ctx.role == Role::Admin => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// Middleware attaching the resolved [`AuthContext`] to the request
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let sessions = &state.sessions;
    let context = authenticate_request(sessions.db(), sessions.jwt(), request.headers())?;
    log::debug!("Authenticated {} ({})", context.username, context.role.as_str());

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Middleware rejecting callers whose attached role is not admin
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    authorize_admin(request.extensions().get::<AuthContext>())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::JwtConfig, models::AccessClaims};
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn setup() -> (AuthDatabase, JwtManager) {
        let db = AuthDatabase::in_memory().unwrap();
        let jwt = JwtManager::new(JwtConfig::new("test-secret".to_string()).unwrap());
        (db, jwt)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTH_HEADER,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn stored_token(db: &AuthDatabase, jwt: &JwtManager, role: Role) -> String {
        let token = jwt
            .issue_access(&AccessClaims::new("acc_1", "alice", role, Duration::hours(1)))
            .unwrap();
        db.put_session("alice", &token, "refresh", Duration::hours(1))
            .unwrap();
        token
    }

    #[test]
    fn test_extract_token_valid() {
        let headers = bearer("abc.def.ghi");
        assert_eq!(extract_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_token_missing_or_malformed() {
        assert!(extract_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_token(&headers).is_none());

        headers.insert(AUTH_HEADER, HeaderValue::from_static("Bearer "));
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn test_authenticate_request_valid() {
        let (db, jwt) = setup();
        let token = stored_token(&db, &jwt, Role::User);

        let context = authenticate_request(&db, &jwt, &bearer(&token)).unwrap();
        assert_eq!(context.id, "acc_1");
        assert_eq!(context.username, "alice");
        assert_eq!(context.role, Role::User);
    }

    #[test]
    fn test_missing_header_is_unauthenticated() {
        let (db, jwt) = setup();
        assert_matches!(
            authenticate_request(&db, &jwt, &HeaderMap::new()),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_unstored_token_is_not_found() {
        let (db, jwt) = setup();
        let token = jwt
            .issue_access(&AccessClaims::new("acc_1", "alice", Role::User, Duration::hours(1)))
            .unwrap();

        assert_matches!(
            authenticate_request(&db, &jwt, &bearer(&token)),
            Err(AuthError::TokenNotFound)
        );
    }

    #[test]
    fn test_revoked_token_is_expired() {
        let (db, jwt) = setup();
        let token = stored_token(&db, &jwt, Role::User);
        db.revoke_session(&token).unwrap();

        assert_matches!(
            authenticate_request(&db, &jwt, &bearer(&token)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_stored_token_with_bad_signature_is_invalid() {
        let (db, jwt) = setup();
        let other = JwtManager::new(JwtConfig::new("other-secret".to_string()).unwrap());
        let forged = stored_token(&db, &other, Role::Admin);

        assert_matches!(
            authenticate_request(&db, &jwt, &bearer(&forged)),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_authorize_admin() {
        let admin = AuthContext {
            id: "acc_1".to_string(),
            username: "root".to_string(),
            role: Role::Admin,
        };
        let user = AuthContext {
            role: Role::User,
            ..admin.clone()
        };

        assert!(authorize_admin(Some(&admin)).is_ok());
        assert_matches!(authorize_admin(Some(&user)), Err(AuthError::Forbidden));
        assert_matches!(authorize_admin(None), Err(AuthError::Forbidden));
    }
}

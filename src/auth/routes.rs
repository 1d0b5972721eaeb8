//! Authentication REST API routes

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use std::sync::Arc;

use super::{
    database::AuthDatabase,
    email::EmailSender,
    error::AuthError,
    jwt::{JwtConfig, JwtManager},
    middleware::{extract_token, require_admin, require_auth},
    models::*,
    session::SessionManager,
};

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Shared authentication state
pub struct AuthState {
    pub sessions: SessionManager,
}

impl AuthState {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Open the database and read signing/email settings from the environment
    pub fn from_env(db_path: &str) -> Result<Self, crate::LoanTrackerError> {
        let db = AuthDatabase::new(db_path)?;
        let jwt = JwtManager::new(JwtConfig::from_env()?);
        let email = Arc::new(EmailSender::from_env());
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        Ok(Self::new(SessionManager::new(db, jwt, email, app_url)))
    }
}

/// Create auth router
pub fn auth_router(state: Arc<AuthState>) -> Router {
    let admin = Router::new()
        .route("/admin/users", get(list_accounts))
        .route("/admin/users/{id}", delete(delete_account))
        .route("/admin/logs", get(list_logs))
        .route_layer(middleware::from_fn(require_admin));

    let authenticated = Router::new()
        .route("/users/profile/{id}", get(get_account))
        .route("/users/password", put(change_password))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/token/refresh", post(refresh_token))
        .route("/users/logout", post(logout))
        .route("/users/password-reset", post(forgot_password))
        .route("/users/password-reset/{token}", get(reset_password))
        .route("/users/verify-email/{token}", get(verify_email))
        .merge(authenticated)
        .with_state(state)
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

fn refresh_cookie(token: &str, max_age: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; Secure; SameSite=Strict",
        REFRESH_COOKIE, token, max_age
    ))
    .ok()
}

/// JSON body plus a `Set-Cookie` header for the refresh token
fn with_refresh_cookie(state: &AuthState, refresh_token: &str, body: impl IntoResponse) -> Response {
    let max_age = state.sessions.jwt().config().refresh_ttl().num_seconds();
    let mut response = body.into_response();
    if let Some(cookie) = refresh_cookie(refresh_token, max_age) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// Read a cookie value from the `Cookie` header(s)
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// POST /users/register - Register new account
async fn register(
    State(state): State<Arc<AuthState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.sessions.register(req).await?;
    Ok((StatusCode::CREATED, Json(AccountResponse { user })))
}

/// POST /users/login - Login with username (or email) and password
async fn login(
    State(state): State<Arc<AuthState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let tokens = state.sessions.login(&req)?;
    let refresh = tokens.refresh_token.clone();
    Ok(with_refresh_cookie(&state, &refresh, Json(tokens)))
}

/// POST /users/token/refresh - Exchange the refresh cookie for a new access token
async fn refresh_token(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let presented = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| AuthError::Validation("refresh token not found".to_string()))?;

    let tokens = state.sessions.refresh(presented)?;
    Ok(with_refresh_cookie(
        &state,
        &tokens.refresh_token,
        Json(AccessTokenResponse {
            access_token: tokens.access_token.clone(),
        }),
    ))
}

/// POST /users/logout - Revoke the bearer access token
async fn logout(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_token(&headers).ok_or(AuthError::Unauthenticated)?;
    state.sessions.logout(token)?;
    Ok(message("User logged out successfully"))
}

/// POST /users/password-reset - Email a reset link
async fn forgot_password(
    State(state): State<Arc<AuthState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.forgot_password(&req.email).await?;
    Ok(message("Reset password link sent to your email"))
}

/// GET /users/password-reset/{token} - Consume a reset link
async fn reset_password(
    State(state): State<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Result<Response, AuthError> {
    let tokens = state.sessions.reset(&token)?;
    Ok(with_refresh_cookie(
        &state,
        &tokens.refresh_token,
        Json(AccessTokenResponse {
            access_token: tokens.access_token.clone(),
        }),
    ))
}

/// GET /users/verify-email/{token} - Activate an account
async fn verify_email(
    State(state): State<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.verify_email(&token)?;
    Ok(message("Email verified successfully"))
}

/// GET /users/profile/{id} - Fetch one account
async fn get_account(
    State(state): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.sessions.find_account(&id)?;
    Ok(Json(AccountResponse { user }))
}

/// PUT /users/password - Change the caller's password
async fn change_password(
    State(state): State<Arc<AuthState>>,
    Extension(context): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .sessions
        .change_password(&context.username, &req.password)?;
    Ok(message("Password changed successfully"))
}

/// GET /admin/users - List regular accounts
async fn list_accounts(
    State(state): State<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let users = state.sessions.list_accounts()?;
    Ok(Json(AccountsResponse { users }))
}

/// DELETE /admin/users/{id} - Remove an account
async fn delete_account(
    State(state): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.delete_account(&id)?;
    Ok(message("User deleted successfully"))
}

/// GET /admin/logs - Query the activity log
async fn list_logs(
    State(state): State<Arc<AuthState>>,
    Query(filter): Query<LogFilter>,
) -> Result<impl IntoResponse, AuthError> {
    let logs = state.sessions.list_logs(&filter)?;
    Ok(Json(LogsResponse { logs }))
}

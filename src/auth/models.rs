//! Authentication data models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

/// One issued access/refresh pair, as persisted in the token store
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token store verdict for one access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Missing,
    Expired,
    Active,
}

impl SessionTokens {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

fn timestamps(ttl: Duration) -> (usize, usize) {
    let now = Utc::now();
    let exp = (now + ttl).timestamp().max(0) as usize;
    (now.timestamp() as usize, exp)
}

fn new_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

impl AccessClaims {
    pub fn new(id: &str, username: &str, role: Role, ttl: Duration) -> Self {
        let (iat, exp) = timestamps(ttl);
        Self {
            id: id.to_string(),
            username: username.to_string(),
            role,
            jti: new_jti(),
            iat,
            exp,
        }
    }
}

/// Refresh token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub username: String,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

impl RefreshClaims {
    pub fn new(username: &str, ttl: Duration) -> Self {
        let (iat, exp) = timestamps(ttl);
        Self {
            username: username.to_string(),
            jti: new_jti(),
            iat,
            exp,
        }
    }
}

/// Claims for email verification and password reset links.
///
/// The same shape serves both purposes, and an access token also decodes
/// into it (extra claims are ignored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub username: String,
    pub role: Role,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

impl ResetClaims {
    pub fn new(username: &str, role: Role, ttl: Duration) -> Self {
        let (iat, exp) = timestamps(ttl);
        Self {
            username: username.to_string(),
            role,
            jti: new_jti(),
            iat,
            exp,
        }
    }
}

/// Identity resolved by the authentication stage and attached to the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub id: String,
    pub username: String,
    pub role: Role,
}

/// Kind of activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    LoginAttempt,
    PasswordResetRequest,
    PasswordResetCompletion,
    Registration,
    EmailVerification,
    Logout,
    LoanApplication,
    LoanStatusUpdate,
    LoanDeletion,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::LoginAttempt => "login_attempt",
            LogKind::PasswordResetRequest => "password_reset_request",
            LogKind::PasswordResetCompletion => "password_reset_completion",
            LogKind::Registration => "registration",
            LogKind::EmailVerification => "email_verification",
            LogKind::Logout => "logout",
            LogKind::LoanApplication => "loan_application",
            LogKind::LoanStatusUpdate => "loan_status_update",
            LogKind::LoanDeletion => "loan_deletion",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "login_attempt" => Some(LogKind::LoginAttempt),
            "password_reset_request" => Some(LogKind::PasswordResetRequest),
            "password_reset_completion" => Some(LogKind::PasswordResetCompletion),
            "registration" => Some(LogKind::Registration),
            "email_verification" => Some(LogKind::EmailVerification),
            "logout" => Some(LogKind::Logout),
            "loan_application" => Some(LogKind::LoanApplication),
            "loan_status_update" => Some(LogKind::LoanStatusUpdate),
            "loan_deletion" => Some(LogKind::LoanDeletion),
            _ => None,
        }
    }
}

/// Security event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub log_type: LogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl LogEntry {
    pub fn new(log_type: LogKind, user_id: Option<&str>, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            log_type,
            message,
            user_id: user_id.map(str::to_string),
        }
    }
}

/// Optional filters for listing log entries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub log_type: Option<LogKind>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
}

/// API request/response types
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Access/refresh pair handed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: Account,
}

#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    pub users: Vec<Account>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!(Role::from_str(Role::Admin.as_str()), Some(Role::Admin));
        assert_eq!(Role::from_str("root"), None);
    }

    #[test]
    fn test_account_serialization_hides_password_hash() {
        let account = Account {
            id: "acc_1".to_string(),
            name: "Alice".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            profile_picture: None,
            role: Role::User,
            is_active: false,
        };

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_claims_get_distinct_jti() {
        let a = AccessClaims::new("id", "alice", Role::User, Duration::hours(1));
        let b = AccessClaims::new("id", "alice", Role::User, Duration::hours(1));
        assert_ne!(a.jti, b.jti);
        assert!(a.exp > a.iat);
    }

    #[test]
    fn test_session_expiry() {
        let row = SessionTokens {
            id: "row".to_string(),
            username: "alice".to_string(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        assert!(row.is_expired());
    }
}

//! Session manager: registration, login, token refresh, logout, password
//! reset and email verification.
//!
//! Account activation is one-way: an account starts unverified and becomes
//! active only by consuming a verification link.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::{
    database::AuthDatabase,
    email::{password_reset_email, verification_email, EmailSender},
    error::AuthError,
    jwt::JwtManager,
    models::*,
    password::{hash_password, validate_password, verify_password},
};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern compiles")
});

/// Character separating local part and domain; banned from usernames
const EMAIL_DELIMITER: char = '@';

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Orchestrates the account directory, token store, token codec and notifier
#[derive(Clone)]
pub struct SessionManager {
    db: AuthDatabase,
    jwt: JwtManager,
    email: Arc<EmailSender>,
    app_url: String,
}

impl SessionManager {
    pub fn new(db: AuthDatabase, jwt: JwtManager, email: Arc<EmailSender>, app_url: String) -> Self {
        Self {
            db,
            jwt,
            email,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn db(&self) -> &AuthDatabase {
        &self.db
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub fn email(&self) -> &EmailSender {
        &self.email
    }

    fn record(&self, kind: LogKind, user_id: Option<&str>, message: String) -> Result<(), AuthError> {
        self.db
            .save_log(&LogEntry::new(kind, user_id, message))
            .map_err(|e| {
                log::error!("failed to write {} log entry: {}", kind.as_str(), e);
                AuthError::Storage(e)
            })
    }

    /// Issue a fresh access/refresh pair and persist it in the token store
    fn issue_session(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let config = self.jwt.config();
        let access_token = self.jwt.issue_access(&AccessClaims::new(
            &account.id,
            &account.username,
            account.role,
            config.access_ttl(),
        ))?;
        let refresh_token = self
            .jwt
            .issue_refresh(&RefreshClaims::new(&account.username, config.refresh_ttl()))?;

        self.db.put_session(
            &account.username,
            &access_token,
            &refresh_token,
            config.access_ttl(),
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn account_by_username(&self, username: &str) -> Result<Account, AuthError> {
        self.db
            .find_account_by_username(username)?
            .ok_or_else(|| AuthError::NotFound("user".to_string()))
    }

    /// Register a new, unverified account and email it a verification link.
    ///
    /// A notifier failure fails the call but leaves the account stored.
    pub async fn register(&self, input: RegisterRequest) -> Result<Account, AuthError> {
        if input.username.trim().is_empty() {
            return Err(AuthError::Validation("username must not be empty".to_string()));
        }
        if input.username.contains(EMAIL_DELIMITER) {
            return Err(AuthError::Validation(format!(
                "username must not contain '{}'",
                EMAIL_DELIMITER
            )));
        }
        if self.db.find_account_by_username(&input.username)?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }
        if !is_valid_email(&input.email) {
            return Err(AuthError::Validation("invalid email format".to_string()));
        }
        if self.db.find_account_by_email(&input.email)?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        validate_password(&input.password).map_err(|e| AuthError::Validation(e.to_string()))?;

        let password_hash = hash_password(&input.password)?;

        // first account bootstraps the admin role; not race-safe
        let role = if self.db.is_empty()? {
            Role::Admin
        } else {
            Role::User
        };

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            username: input.username,
            email: input.email,
            password_hash,
            profile_picture: input.profile_picture,
            role,
            is_active: false,
        };
        self.db.create_account(&account)?;
        log::info!("Registered account {} with role {}", account.username, role.as_str());

        let token = self.jwt.issue_reset(&ResetClaims::new(
            &account.username,
            account.role,
            self.jwt.config().reset_ttl(),
        ))?;
        let link = format!("{}/users/verify-email/{}", self.app_url, token);
        let (subject, body) = verification_email(&account.name, &link);

        self.email
            .send(&account.email, &subject, &body)
            .await
            .map_err(|e| {
                log::error!("Failed to send verification email to {}: {}", account.username, e);
                AuthError::Notifier(e.to_string())
            })?;

        self.record(
            LogKind::Registration,
            Some(&account.id),
            format!("Account registered for user {}", account.username),
        )?;

        Ok(account)
    }

    /// Authenticate by username (or email) and password.
    ///
    /// Unverified accounts are rejected before any token is issued.
    pub fn login(&self, input: &LoginRequest) -> Result<TokenPair, AuthError> {
        let found = match self.db.find_account_by_username(&input.username)? {
            Some(account) => Some(account),
            None => self.db.find_account_by_email(&input.username)?,
        };

        let account = match found {
            Some(account) => account,
            None => {
                self.record(
                    LogKind::LoginAttempt,
                    None,
                    format!("Failed login attempt for username/email: {}", input.username),
                )?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&input.password, &account.password_hash)? {
            self.record(
                LogKind::LoginAttempt,
                Some(&account.id),
                format!("Failed login attempt for user {}", account.username),
            )?;
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            self.record(
                LogKind::LoginAttempt,
                Some(&account.id),
                format!("Login refused for unverified user {}", account.username),
            )?;
            return Err(AuthError::NotVerified);
        }

        let tokens = self.issue_session(&account)?;

        self.record(
            LogKind::LoginAttempt,
            Some(&account.id),
            format!("Successful login for user {}", account.username),
        )?;
        log::info!("User {} logged in", account.username);

        Ok(tokens)
    }

    /// Mint and persist a new pair from a refresh token.
    ///
    /// The presented refresh token stays valid until its own expiry.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.verify_refresh(refresh_token)?;
        let account = self
            .db
            .find_account_by_username(&claims.username)?
            .ok_or(AuthError::InvalidToken)?;

        let tokens = self.issue_session(&account)?;
        log::debug!("Refreshed session for {}", account.username);
        Ok(tokens)
    }

    /// Revoke one access token. Refresh tokens are untouched.
    pub fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let session = self.db.find_session(access_token)?;
        self.db.revoke_session(access_token)?;

        if let Some(session) = session {
            let account = self.db.find_account_by_username(&session.username)?;
            self.record(
                LogKind::Logout,
                account.as_ref().map(|a| a.id.as_str()),
                format!("User {} logged out", session.username),
            )?;
            log::info!("User {} logged out", session.username);
        }
        Ok(())
    }

    /// Start a password reset: sign the holder in and email a reset link.
    ///
    /// Returns the token embedded in the emailed link.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let account = self
            .db
            .find_account_by_email(email)?
            .ok_or_else(|| AuthError::NotFound("user".to_string()))?;

        self.issue_session(&account)?;

        // the link carries its own access-shaped token, not the stored one
        let reset_token = self.jwt.issue_access(&AccessClaims::new(
            &account.id,
            &account.username,
            account.role,
            self.jwt.config().reset_ttl(),
        ))?;
        let link = format!("{}/users/password-reset/{}", self.app_url, reset_token);
        let (subject, body) = password_reset_email(&account.name, &link);
        self.email
            .send(&account.email, &subject, &body)
            .await
            .map_err(|e| {
                log::error!("Failed to send reset email to {}: {}", account.username, e);
                AuthError::Notifier(e.to_string())
            })?;

        self.record(
            LogKind::PasswordResetRequest,
            Some(&account.id),
            format!("Password reset requested for user {}", account.username),
        )?;

        Ok(reset_token)
    }

    /// Consume a reset link: re-authenticate its holder with a fresh pair.
    ///
    /// The password itself is changed separately through `change_password`.
    pub fn reset(&self, token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.verify_reset(token)?;
        let account = self.account_by_username(&claims.username)?;

        let tokens = self.issue_session(&account)?;

        self.record(
            LogKind::PasswordResetCompletion,
            Some(&account.id),
            format!("Password reset completed for user {}", account.username),
        )?;

        Ok(tokens)
    }

    /// Replace the password of an already authenticated account
    pub fn change_password(&self, username: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password).map_err(|e| AuthError::Validation(e.to_string()))?;
        let password_hash = hash_password(new_password)?;

        if !self.db.set_password(username, &password_hash)? {
            return Err(AuthError::NotFound("user".to_string()));
        }
        log::info!("Password changed for {}", username);
        Ok(())
    }

    /// Activate the account named in a verification token.
    ///
    /// Replaying the same link is accepted and leaves the account active.
    pub fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.jwt.verify_reset(token)?;
        let account = self.account_by_username(&claims.username)?;

        self.db.set_activation(&account.username, true)?;

        self.record(
            LogKind::EmailVerification,
            Some(&account.id),
            format!("Email verified for user {}", account.username),
        )?;
        Ok(())
    }

    pub fn find_account(&self, id: &str) -> Result<Account, AuthError> {
        self.db
            .find_account_by_id(id)?
            .ok_or_else(|| AuthError::NotFound("user".to_string()))
    }

    /// Accounts holding the plain `user` role
    pub fn list_accounts(&self) -> Result<Vec<Account>, AuthError> {
        Ok(self.db.list_accounts_by_role(Role::User)?)
    }

    pub fn delete_account(&self, id: &str) -> Result<(), AuthError> {
        if !self.db.delete_account(id)? {
            return Err(AuthError::NotFound("user".to_string()));
        }
        log::info!("Deleted account {}", id);
        Ok(())
    }

    pub fn list_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, AuthError> {
        Ok(self.db.list_logs(filter)?)
    }
}

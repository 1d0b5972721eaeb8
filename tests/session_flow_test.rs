// tests/session_flow_test.rs - Registration, login, refresh, logout and reset flows

use std::sync::Arc;

use assert_matches::assert_matches;
use loan_tracker::auth::{
    password::verify_password, AuthDatabase, AuthError, EmailSender, JwtConfig, JwtManager,
    LogFilter, LogKind, LoginRequest, MockEmailService, RegisterRequest, Role, SessionManager,
};

fn sessions_with(email: EmailSender) -> SessionManager {
    let db = AuthDatabase::in_memory().unwrap();
    let jwt = JwtManager::new(JwtConfig::new("integration-secret".to_string()).unwrap());
    SessionManager::new(db, jwt, Arc::new(email), "http://localhost:8080".to_string())
}

fn sessions() -> SessionManager {
    sessions_with(EmailSender::Mock(MockEmailService::new()))
}

fn registration(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        name: username.to_uppercase(),
        username: username.to_string(),
        email: email.to_string(),
        password: "Secret1!".to_string(),
        profile_picture: None,
    }
}

fn login(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

/// Token at the end of the last emailed link containing `marker`
fn last_link_token(sessions: &SessionManager, marker: &str) -> String {
    let sent = sessions.email().sent();
    let body = &sent.last().expect("an email was sent").body;
    let start = body.find(marker).expect("link present") + marker.len();
    body[start..]
        .split(|c| c == '"' || c == '<')
        .next()
        .unwrap()
        .to_string()
}

async fn register_and_verify(sessions: &SessionManager, username: &str, email: &str) {
    sessions
        .register(registration(username, email))
        .await
        .unwrap();
    let token = last_link_token(sessions, "/users/verify-email/");
    sessions.verify_email(&token).unwrap();
}

#[tokio::test]
async fn stored_hash_is_not_plaintext() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();

    let stored = sessions
        .db()
        .find_account_by_username("alice")
        .unwrap()
        .unwrap();
    assert_ne!(stored.password_hash, "Secret1!");
    assert!(verify_password("Secret1!", &stored.password_hash).unwrap());
    assert!(!verify_password("Secret2!", &stored.password_hash).unwrap());
}

#[tokio::test]
async fn first_account_is_admin_second_is_user() {
    let sessions = sessions();
    let first = sessions
        .register(registration("root", "root@example.com"))
        .await
        .unwrap();
    let second = sessions
        .register(registration("bob", "bob@example.com"))
        .await
        .unwrap();

    assert_eq!(first.role, Role::Admin);
    assert_eq!(second.role, Role::User);
}

#[tokio::test]
async fn duplicate_username_and_email_are_rejected() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();

    assert_matches!(
        sessions
            .register(registration("alice", "other@example.com"))
            .await,
        Err(AuthError::DuplicateUsername)
    );
    assert_matches!(
        sessions
            .register(registration("alice2", "alice@example.com"))
            .await,
        Err(AuthError::DuplicateEmail)
    );
}

#[tokio::test]
async fn notifier_failure_fails_registration_but_keeps_account() {
    let sessions = sessions_with(EmailSender::Mock(MockEmailService::failing()));

    let result = sessions
        .register(registration("alice", "alice@example.com"))
        .await;
    assert_matches!(result, Err(AuthError::Notifier(_)));

    let stored = sessions.db().find_account_by_username("alice").unwrap();
    assert!(stored.is_some());
    assert!(!stored.unwrap().is_active);
}

#[tokio::test]
async fn verification_email_does_not_render_markup_from_name() {
    let sessions = sessions();
    let mut request = registration("alice", "victim@example.com");
    request.name = r#"<a href="http://evil.example/login">Click to keep your account</a>"#.to_string();
    sessions.register(request).await.unwrap();

    let sent = sessions.email().sent();
    let body = &sent.last().unwrap().body;
    assert!(!body.contains("<a href=\"http://evil.example"));
    assert!(body.contains("&lt;a href=&quot;http://evil.example/login&quot;&gt;"));

    // the genuine link survives escaping intact
    let token = last_link_token(&sessions, "/users/verify-email/");
    sessions.verify_email(&token).unwrap();
}

#[tokio::test]
async fn successful_login_returns_two_distinct_tokens() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    let tokens = sessions.login(&login("alice", "Secret1!")).unwrap();
    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());
    assert_ne!(tokens.access_token, tokens.refresh_token);
    assert!(sessions.db().is_session_valid(&tokens.access_token).unwrap());

    let successes = sessions
        .list_logs(&LogFilter {
            log_type: Some(LogKind::LoginAttempt),
            ..Default::default()
        })
        .unwrap();
    assert!(successes
        .iter()
        .any(|entry| entry.message.contains("Successful login")));
}

#[tokio::test]
async fn login_accepts_email_in_place_of_username() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    assert!(sessions
        .login(&login("alice@example.com", "Secret1!"))
        .is_ok());
}

#[tokio::test]
async fn wrong_password_logs_exactly_one_failed_attempt() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;
    let account = sessions
        .db()
        .find_account_by_username("alice")
        .unwrap()
        .unwrap();

    let result = sessions.login(&login("alice", "Wrong123!"));
    assert_matches!(result, Err(AuthError::InvalidCredentials));

    let attempts = sessions
        .list_logs(&LogFilter {
            log_type: Some(LogKind::LoginAttempt),
            user_id: Some(account.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].message.contains("Failed login attempt"));
}

#[tokio::test]
async fn unknown_user_logs_attempt_without_account_id() {
    let sessions = sessions();

    assert_matches!(
        sessions.login(&login("ghost", "Secret1!")),
        Err(AuthError::InvalidCredentials)
    );

    let logs = sessions.list_logs(&LogFilter::default()).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].user_id.is_none());
}

#[tokio::test]
async fn unverified_account_cannot_log_in() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();

    assert_matches!(
        sessions.login(&login("alice", "Secret1!")),
        Err(AuthError::NotVerified)
    );
}

#[tokio::test]
async fn verify_email_tolerates_replay() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();
    let token = last_link_token(&sessions, "/users/verify-email/");

    sessions.verify_email(&token).unwrap();
    sessions.verify_email(&token).unwrap();

    let stored = sessions
        .db()
        .find_account_by_username("alice")
        .unwrap()
        .unwrap();
    assert!(stored.is_active);
}

#[tokio::test]
async fn verify_email_rejects_tampered_token() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();
    let mut token = last_link_token(&sessions, "/users/verify-email/");
    token.push('x');

    assert_matches!(sessions.verify_email(&token), Err(AuthError::InvalidToken));
}

#[tokio::test]
async fn logout_revokes_only_that_session() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    let laptop = sessions.login(&login("alice", "Secret1!")).unwrap();
    let phone = sessions.login(&login("alice", "Secret1!")).unwrap();
    assert_ne!(laptop.access_token, phone.access_token);

    sessions.logout(&laptop.access_token).unwrap();

    assert!(!sessions.db().is_session_valid(&laptop.access_token).unwrap());
    assert!(sessions.db().is_session_valid(&phone.access_token).unwrap());

    // second logout of the same token is not an error
    sessions.logout(&laptop.access_token).unwrap();

    let logouts = sessions
        .list_logs(&LogFilter {
            log_type: Some(LogKind::Logout),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(logouts.len(), 2);
    assert!(logouts.iter().all(|entry| entry.user_id.is_some()));
}

#[tokio::test]
async fn refresh_mints_new_stored_pair() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;
    let original = sessions.login(&login("alice", "Secret1!")).unwrap();

    let refreshed = sessions.refresh(&original.refresh_token).unwrap();
    assert_ne!(refreshed.access_token, original.access_token);
    assert!(sessions
        .db()
        .is_session_valid(&refreshed.access_token)
        .unwrap());

    // the old refresh token is not revoked
    assert!(sessions.refresh(&original.refresh_token).is_ok());

    let claims = sessions.jwt().verify_access(&refreshed.access_token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, Role::Admin);
}

#[tokio::test]
async fn refresh_rejects_malformed_token() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    assert_matches!(
        sessions.refresh("not.a.token"),
        Err(AuthError::InvalidToken)
    );
}

#[tokio::test]
async fn forgot_password_then_reset_reauthenticates() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    let emailed = sessions
        .forgot_password("alice@example.com")
        .await
        .unwrap();
    let link_token = last_link_token(&sessions, "/users/password-reset/");
    assert_eq!(emailed, link_token);

    let tokens = sessions.reset(&link_token).unwrap();
    assert!(sessions.db().is_session_valid(&tokens.access_token).unwrap());

    let requests = sessions
        .list_logs(&LogFilter {
            log_type: Some(LogKind::PasswordResetRequest),
            ..Default::default()
        })
        .unwrap();
    let completions = sessions
        .list_logs(&LogFilter {
            log_type: Some(LogKind::PasswordResetCompletion),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(completions.len(), 1);
}

#[tokio::test]
async fn reset_link_signs_in_unverified_account_without_activating_it() {
    let sessions = sessions();
    sessions
        .register(registration("alice", "alice@example.com"))
        .await
        .unwrap();

    sessions.forgot_password("alice@example.com").await.unwrap();
    let link_token = last_link_token(&sessions, "/users/password-reset/");
    let tokens = sessions.reset(&link_token).unwrap();
    assert!(sessions.db().is_session_valid(&tokens.access_token).unwrap());

    let stored = sessions
        .db()
        .find_account_by_username("alice")
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);
    assert_matches!(
        sessions.login(&login("alice", "Secret1!")),
        Err(AuthError::NotVerified)
    );
}

#[tokio::test]
async fn forgot_password_for_unknown_email() {
    let sessions = sessions();
    assert_matches!(
        sessions.forgot_password("nobody@example.com").await,
        Err(AuthError::NotFound(_))
    );
}

#[tokio::test]
async fn change_password_replaces_credentials() {
    let sessions = sessions();
    register_and_verify(&sessions, "alice", "alice@example.com").await;

    assert_matches!(
        sessions.change_password("alice", "weak"),
        Err(AuthError::Validation(_))
    );
    sessions.change_password("alice", "Fresh2024#").unwrap();

    assert_matches!(
        sessions.login(&login("alice", "Secret1!")),
        Err(AuthError::InvalidCredentials)
    );
    assert!(sessions.login(&login("alice", "Fresh2024#")).is_ok());
}

#[tokio::test]
async fn admin_listing_and_deletion() {
    let sessions = sessions();
    register_and_verify(&sessions, "root", "root@example.com").await;
    register_and_verify(&sessions, "bob", "bob@example.com").await;

    let users = sessions.list_accounts().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "bob");

    let bob_id = users[0].id.clone();
    assert_eq!(sessions.find_account(&bob_id).unwrap().username, "bob");

    sessions.delete_account(&bob_id).unwrap();
    assert_matches!(sessions.find_account(&bob_id), Err(AuthError::NotFound(_)));
    assert_matches!(
        sessions.delete_account(&bob_id),
        Err(AuthError::NotFound(_))
    );
}

#[tokio::test]
async fn file_backed_database_persists_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.db");
    let path = path.to_str().unwrap();

    {
        let db = AuthDatabase::new(path).unwrap();
        let jwt = JwtManager::new(JwtConfig::new("integration-secret".to_string()).unwrap());
        let email = Arc::new(EmailSender::Mock(MockEmailService::new()));
        let sessions = SessionManager::new(db, jwt, email, "http://localhost".to_string());
        sessions
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();
    }

    let reopened = AuthDatabase::new(path).unwrap();
    assert!(!reopened.is_empty().unwrap());
    assert!(reopened.find_account_by_username("alice").unwrap().is_some());
}

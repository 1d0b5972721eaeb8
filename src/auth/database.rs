//! SQLite database operations for authentication
//!
//! One connection backs three collaborators: the account directory, the
//! session token store and the activity log. Every operation is a single
//! statement, so each is atomic on its own.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{
    params, params_from_iter, types::Value, Connection, ErrorCode, Result as SqliteResult, Row,
};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::AuthError;
use super::models::{
    Account, LogEntry, LogFilter, LogKind, Role, SessionState, SessionTokens,
};

/// Database connection wrapper
pub struct AuthDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl AuthDatabase {
    /// Open (or create) a database file and initialize tables
    pub fn new(path: &str) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_tables()?;
        Ok(db)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_tables()?;
        Ok(db)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_tables(&self) -> SqliteResult<()> {
        let conn = self.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                profile_picture TEXT,
                role TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS session_tokens (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activity_logs (
                id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                log_type TEXT NOT NULL,
                message TEXT NOT NULL,
                user_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_session_access ON session_tokens(access_token);
            CREATE INDEX IF NOT EXISTS idx_session_username ON session_tokens(username);
            CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON activity_logs(timestamp);
            "#,
        )?;

        Ok(())
    }

    // ==================== Account Directory ====================

    /// Insert a new account; username and email must both be unused
    pub fn create_account(&self, account: &Account) -> Result<(), AuthError> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO accounts (id, name, username, email, password_hash, profile_picture, role, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account.id,
                account.name,
                account.username,
                account.email,
                account.password_hash,
                account.profile_picture,
                account.role.as_str(),
                account.is_active as i32,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, Some(msg)))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                if msg.contains("accounts.username") {
                    Err(AuthError::DuplicateUsername)
                } else if msg.contains("accounts.email") {
                    Err(AuthError::DuplicateEmail)
                } else {
                    Err(AuthError::Storage(rusqlite::Error::SqliteFailure(err, Some(msg))))
                }
            }
            Err(e) => Err(AuthError::Storage(e)),
        }
    }

    fn find_account_where(&self, column: &str, value: &str) -> SqliteResult<Option<Account>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, username, email, password_hash, profile_picture, role, is_active
             FROM accounts WHERE {} = ?1",
            column
        ))?;

        let mut rows = stmt.query(params![value])?;
        match rows.next()? {
            Some(row) => Ok(Some(account_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn find_account_by_id(&self, id: &str) -> SqliteResult<Option<Account>> {
        self.find_account_where("id", id)
    }

    pub fn find_account_by_username(&self, username: &str) -> SqliteResult<Option<Account>> {
        self.find_account_where("username", username)
    }

    pub fn find_account_by_email(&self, email: &str) -> SqliteResult<Option<Account>> {
        self.find_account_where("email", email)
    }

    /// Set the activation flag; returns whether an account matched
    pub fn set_activation(&self, username: &str, active: bool) -> SqliteResult<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE accounts SET is_active = ?1 WHERE username = ?2",
            params![active as i32, username],
        )?;
        Ok(updated > 0)
    }

    /// Overwrite the password hash; returns whether an account matched
    pub fn set_password(&self, username: &str, password_hash: &str) -> SqliteResult<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE username = ?2",
            params![password_hash, username],
        )?;
        Ok(updated > 0)
    }

    /// True when no account has been registered yet
    pub fn is_empty(&self) -> SqliteResult<bool> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    pub fn list_accounts_by_role(&self, role: Role) -> SqliteResult<Vec<Account>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, username, email, password_hash, profile_picture, role, is_active
             FROM accounts WHERE role = ?1 ORDER BY username",
        )?;
        let accounts = stmt
            .query_map(params![role.as_str()], account_from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(accounts)
    }

    /// Delete an account by id; returns whether a row was removed
    pub fn delete_account(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ==================== Token Store ====================

    /// Record a newly issued pair. Earlier rows for the same user are kept.
    pub fn put_session(
        &self,
        username: &str,
        access_token: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> SqliteResult<()> {
        let conn = self.lock();
        let expires_at = Utc::now() + ttl;
        conn.execute(
            "INSERT INTO session_tokens (id, username, access_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                username,
                access_token,
                refresh_token,
                expires_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Look up the row holding this exact access token
    pub fn find_session(&self, access_token: &str) -> SqliteResult<Option<SessionTokens>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, username, access_token, refresh_token, expires_at
             FROM session_tokens WHERE access_token = ?1",
        )?;

        let mut rows = stmt.query(params![access_token])?;
        match rows.next()? {
            Some(row) => Ok(Some(SessionTokens {
                id: row.get(0)?,
                username: row.get(1)?,
                access_token: row.get(2)?,
                refresh_token: row.get(3)?,
                expires_at: millis_to_datetime(row.get(4)?),
            })),
            None => Ok(None),
        }
    }

    /// Where this access token stands in the store
    pub fn session_state(&self, access_token: &str) -> SqliteResult<SessionState> {
        Ok(match self.find_session(access_token)? {
            None => SessionState::Missing,
            Some(session) if session.is_expired() => SessionState::Expired,
            Some(_) => SessionState::Active,
        })
    }

    /// True iff the access token is stored and not yet expired
    pub fn is_session_valid(&self, access_token: &str) -> SqliteResult<bool> {
        Ok(self.session_state(access_token)? == SessionState::Active)
    }

    /// Expire the row for this access token. Unknown tokens are ignored.
    pub fn revoke_session(&self, access_token: &str) -> SqliteResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE session_tokens SET expires_at = ?1 WHERE access_token = ?2",
            params![Utc::now().timestamp_millis(), access_token],
        )?;
        Ok(())
    }

    // ==================== Activity Log ====================

    pub fn save_log(&self, entry: &LogEntry) -> SqliteResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO activity_logs (id, timestamp, log_type, message, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.timestamp.timestamp_millis(),
                entry.log_type.as_str(),
                entry.message,
                entry.user_id,
            ],
        )?;
        Ok(())
    }

    /// List log entries matching the filter, newest first
    pub fn list_logs(&self, filter: &LogFilter) -> SqliteResult<Vec<LogEntry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, log_type, message, user_id FROM activity_logs WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = filter.log_type {
            values.push(Value::Text(kind.as_str().to_string()));
            sql.push_str(&format!(" AND log_type = ?{}", values.len()));
        }
        if let Some(start) = filter.start_date {
            values.push(Value::Integer(start.timestamp_millis()));
            sql.push_str(&format!(" AND timestamp >= ?{}", values.len()));
        }
        if let Some(end) = filter.end_date {
            values.push(Value::Integer(end.timestamp_millis()));
            sql.push_str(&format!(" AND timestamp <= ?{}", values.len()));
        }
        if let Some(user_id) = &filter.user_id {
            values.push(Value::Text(user_id.clone()));
            sql.push_str(&format!(" AND user_id = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY timestamp DESC, rowid DESC");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params_from_iter(values), |row| {
                let kind: String = row.get(2)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    timestamp: millis_to_datetime(row.get(1)?),
                    log_type: LogKind::from_str(&kind).unwrap_or(LogKind::LoginAttempt),
                    message: row.get(3)?,
                    user_id: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}

impl Clone for AuthDatabase {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn account_from_row(row: &Row<'_>) -> SqliteResult<Account> {
    let role: String = row.get(6)?;
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        profile_picture: row.get(5)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        is_active: row.get::<_, i32>(7)? != 0,
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

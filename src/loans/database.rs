//! SQLite storage for loan records
//!
//! Shares the connection of [`AuthDatabase`] so accounts, sessions, logs
//! and loans live in one file.

use chrono::{DateTime, Utc};
use rusqlite::{params, Result as SqliteResult, Row};

use super::models::{Loan, LoanStatus};
use crate::auth::AuthDatabase;

#[derive(Clone)]
pub struct LoanDatabase {
    db: AuthDatabase,
}

impl LoanDatabase {
    /// Create the loans table on the given database if needed
    pub fn attach(db: &AuthDatabase) -> SqliteResult<Self> {
        let loans = Self { db: db.clone() };
        loans.init_tables()?;
        Ok(loans)
    }

    fn init_tables(&self) -> SqliteResult<()> {
        let conn = self.db.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS loans (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount REAL NOT NULL,
                term INTEGER NOT NULL,
                purpose TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status);
            CREATE INDEX IF NOT EXISTS idx_loans_created ON loans(created_at);
            "#,
        )
    }

    pub fn save_loan(&self, loan: &Loan) -> SqliteResult<()> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO loans (id, user_id, amount, term, purpose, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                loan.id,
                loan.user_id,
                loan.amount,
                loan.term,
                loan.purpose,
                loan.status.as_str(),
                loan.created_at.timestamp_millis(),
                loan.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn find_loan(&self, id: &str) -> SqliteResult<Option<Loan>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, term, purpose, status, created_at, updated_at
             FROM loans WHERE id = ?1",
        )?;

        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(loan_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// List loans, optionally of one status, by creation time
    pub fn list_loans(&self, status: Option<LoanStatus>, newest_first: bool) -> SqliteResult<Vec<Loan>> {
        let direction = if newest_first { "DESC" } else { "ASC" };
        let conn = self.db.lock();

        let loans = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, user_id, amount, term, purpose, status, created_at, updated_at
                     FROM loans WHERE status = ?1 ORDER BY created_at {0}, rowid {0}",
                    direction
                ))?;
                let rows = stmt.query_map(params![status.as_str()], loan_from_row)?;
                rows.collect::<SqliteResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, user_id, amount, term, purpose, status, created_at, updated_at
                     FROM loans ORDER BY created_at {0}, rowid {0}",
                    direction
                ))?;
                let rows = stmt.query_map([], loan_from_row)?;
                rows.collect::<SqliteResult<Vec<_>>>()?
            }
        };
        Ok(loans)
    }

    /// Move a loan to a new status; returns whether a loan matched
    pub fn update_status(
        &self,
        id: &str,
        status: LoanStatus,
        changed_at: DateTime<Utc>,
    ) -> SqliteResult<bool> {
        let conn = self.db.lock();
        let updated = conn.execute(
            "UPDATE loans SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), changed_at.timestamp_millis(), id],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_loan(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.db.lock();
        let deleted = conn.execute("DELETE FROM loans WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn loan_from_row(row: &Row<'_>) -> SqliteResult<Loan> {
    let status: String = row.get(5)?;
    Ok(Loan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        term: row.get(3)?,
        purpose: row.get(4)?,
        status: LoanStatus::from_str(&status).unwrap_or(LoanStatus::Pending),
        created_at: DateTime::from_timestamp_millis(row.get(6)?).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_millis(row.get(7)?).unwrap_or_default(),
    })
}

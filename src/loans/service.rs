//! Loan applications and their admin review

use chrono::Utc;

use super::{
    database::LoanDatabase,
    error::LoanError,
    models::{Loan, LoanOrder, LoanQuery, LoanRequest, LoanStatus},
};
use crate::auth::{AuthContext, AuthDatabase, LogEntry, LogKind, Role};

#[derive(Clone)]
pub struct LoanService {
    loans: LoanDatabase,
    db: AuthDatabase,
}

impl LoanService {
    pub fn new(db: &AuthDatabase) -> Result<Self, LoanError> {
        Ok(Self {
            loans: LoanDatabase::attach(db)?,
            db: db.clone(),
        })
    }

    fn record(&self, kind: LogKind, user_id: &str, message: String) -> Result<(), LoanError> {
        self.db
            .save_log(&LogEntry::new(kind, Some(user_id), message))
            .map_err(|e| {
                log::error!("failed to write {} log entry: {}", kind.as_str(), e);
                LoanError::Storage(e)
            })
    }

    /// File a new pending loan for `user_id`
    pub fn apply(&self, user_id: &str, input: LoanRequest) -> Result<Loan, LoanError> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(LoanError::Validation("amount must be positive".to_string()));
        }
        if input.term < 1 {
            return Err(LoanError::Validation("term must be at least one month".to_string()));
        }
        if input.purpose.trim().is_empty() {
            return Err(LoanError::Validation("purpose must not be empty".to_string()));
        }

        let now = Utc::now();
        let loan = Loan {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: input.amount,
            term: input.term,
            purpose: input.purpose,
            status: LoanStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.loans.save_loan(&loan)?;

        self.record(
            LogKind::LoanApplication,
            user_id,
            format!("Loan application {} submitted", loan.id),
        )?;
        log::info!("Loan {} submitted by {}", loan.id, user_id);
        Ok(loan)
    }

    /// Fetch one loan; only its applicant or an admin may see it
    pub fn view(&self, caller: &AuthContext, id: &str) -> Result<Loan, LoanError> {
        let loan = self.loans.find_loan(id)?.ok_or(LoanError::NotFound)?;
        if loan.user_id != caller.id && caller.role != Role::Admin {
            return Err(LoanError::Forbidden);
        }
        Ok(loan)
    }

    /// List loans by creation time.
    ///
    /// Reviewed statuses are always newest first; otherwise `order`
    /// decides, oldest first by default.
    pub fn list(&self, query: &LoanQuery) -> Result<Vec<Loan>, LoanError> {
        let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                LoanStatus::from_str(raw)
                    .ok_or_else(|| LoanError::Validation("invalid status".to_string()))?,
            ),
            None => None,
        };
        let order = match query.order.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => LoanOrder::from_str(raw)
                .ok_or_else(|| LoanError::Validation("invalid order".to_string()))?,
            None => LoanOrder::Asc,
        };

        let newest_first = status.is_some_and(|s| s.is_processed()) || order == LoanOrder::Desc;
        Ok(self.loans.list_loans(status, newest_first)?)
    }

    /// Approve or reject a pending loan
    pub fn review(&self, admin_id: &str, id: &str, status: &str) -> Result<(), LoanError> {
        let status = match LoanStatus::from_str(status) {
            Some(s) if s.is_processed() => s,
            _ => {
                return Err(LoanError::Validation(
                    "status must be approved or rejected".to_string(),
                ))
            }
        };

        let loan = self.loans.find_loan(id)?.ok_or(LoanError::NotFound)?;
        if loan.status.is_processed() {
            return Err(LoanError::AlreadyProcessed);
        }

        if !self.loans.update_status(id, status, Utc::now())? {
            return Err(LoanError::NotFound);
        }

        self.record(
            LogKind::LoanStatusUpdate,
            admin_id,
            format!("Loan {} {}", id, status.as_str()),
        )?;
        log::info!("Loan {} {} by {}", id, status.as_str(), admin_id);
        Ok(())
    }

    pub fn delete(&self, admin_id: &str, id: &str) -> Result<(), LoanError> {
        if !self.loans.delete_loan(id)? {
            return Err(LoanError::NotFound);
        }
        self.record(LogKind::LoanDeletion, admin_id, format!("Loan {} deleted", id))?;
        log::info!("Loan {} deleted by {}", id, admin_id);
        Ok(())
    }
}

//! Loan data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of a loan application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LoanStatus::Pending),
            "approved" => Some(LoanStatus::Approved),
            "rejected" => Some(LoanStatus::Rejected),
            _ => None,
        }
    }

    /// Approved and rejected loans are final
    pub fn is_processed(&self) -> bool {
        !matches!(self, LoanStatus::Pending)
    }
}

/// Sort direction on creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanOrder {
    Asc,
    Desc,
}

impl LoanOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(LoanOrder::Asc),
            "desc" => Some(LoanOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    /// Term in months
    pub term: i64,
    pub purpose: String,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// API request/response types

#[derive(Debug, Deserialize)]
pub struct LoanRequest {
    pub amount: f64,
    pub term: i64,
    pub purpose: String,
}

#[derive(Debug, Deserialize)]
pub struct LoanStatusRequest {
    pub status: String,
}

/// Raw `?status=&order=` query; values are checked by the service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanQuery {
    pub status: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan: Loan,
}

#[derive(Debug, Serialize)]
pub struct LoansResponse {
    pub loans: Vec<Loan>,
}

//! Loan module
//!
//! Loan applications filed by authenticated users and reviewed by admins.

pub mod database;
pub mod error;
pub mod models;
pub mod routes;
pub mod service;

pub use database::LoanDatabase;
pub use error::LoanError;
pub use models::*;
pub use routes::{loan_router, LoanState};
pub use service::LoanService;

//! # Loan Tracker Identity Service
//!
//! Accounts, sessions and authorization for the Loan Tracker API.
//!
//! ## Features
//!
//! - **Accounts**: registration with email verification, first account becomes admin
//! - **Sessions**: JWT access/refresh pairs, access tokens revocable through a token store
//! - **Password reset**: emailed links that re-authenticate their holder
//! - **Authorization gate**: bearer-token authentication and admin role checks
//! - **Activity log**: login, reset and loan events queryable by admins
//! - **Loans**: users apply, admins approve, reject or delete
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loan_tracker::{
//!     auth::AuthState,
//!     loans::LoanState,
//!     servers::{ApiConfig, ApiServer},
//! };
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Identity, session and authorization core
pub mod auth;

/// Loan applications and admin review
pub mod loans;

/// HTTP server
pub mod servers;

/// Logger initialisation
pub mod logging;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use auth::{AuthError, AuthState, SessionManager};
pub use loans::{LoanError, LoanState};
pub use servers::{ApiConfig, ApiServer};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Start-up and server errors
#[derive(Debug, thiserror::Error)]
pub enum LoanTrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LoanTrackerError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

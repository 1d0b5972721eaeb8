//! Authentication module
//!
//! Provides the identity, session and authorization core:
//! - Account registration with email verification
//! - Login issuing a JWT access/refresh pair
//! - Server-side session rows making access tokens revocable
//! - Password reset links
//! - Bearer-token authentication and admin role gating for HTTP routes

pub mod database;
pub mod email;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;
pub mod session;

pub use database::AuthDatabase;
pub use email::{EmailSender, MockEmailService};
pub use error::{AuthError, TokenError};
pub use jwt::{JwtConfig, JwtManager};
pub use models::*;
pub use routes::{auth_router, AuthState};
pub use session::SessionManager;

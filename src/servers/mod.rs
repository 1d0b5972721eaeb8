// Modules for server components
pub mod api;

// Re-export public APIs
pub use api::{ApiConfig, ApiServer};

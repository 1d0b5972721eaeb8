use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use loan_tracker::{auth::AuthState, logging, ApiConfig, ApiServer, LoanState};

#[derive(Parser, Debug)]
#[command(name = "loan_tracker", version, about = loan_tracker::DESCRIPTION)]
struct Config {
    /// Address to bind the HTTP API on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for the HTTP API
    #[arg(short = 'p', long, default_value_t = 8080)]
    port: u16,

    /// Path to SQLite database for accounts, sessions and activity logs
    #[arg(long, default_value = "data/loan_tracker.db")]
    db_path: String,

    /// Write rotating log files to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    let _logger = logging::setup_logging(config.log_dir.as_deref())?;

    // Ensure data directory exists
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Missing JWT_SECRET is fatal here, before anything listens
    let auth_state = match AuthState::from_env(&config.db_path) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            log::error!("Failed to initialize authentication: {}", e);
            return Err(e.into());
        }
    };
    log::info!("Authentication ready (db: {})", config.db_path);

    let loan_state = Arc::new(LoanState::attach(&auth_state)?);

    let server = ApiServer::new(
        ApiConfig {
            port: config.port,
            host: config.host,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        },
        auth_state,
        loan_state,
    );

    server.start().await?;
    Ok(())
}

use axum::{response::Json as ResponseJson, routing::get, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{auth_router, AuthState};
use crate::loans::{loan_router, LoanState};

#[derive(Serialize, Debug, Clone)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ApiServer {
    config: ApiConfig,
    auth: Arc<AuthState>,
    loans: Arc<LoanState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, auth: Arc<AuthState>, loans: Arc<LoanState>) -> Self {
        Self {
            config,
            auth,
            loans,
        }
    }

    pub async fn start(&self) -> Result<(), crate::LoanTrackerError> {
        let app = self.create_router();
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| crate::LoanTrackerError::Server(format!("invalid address: {}", e)))?;
        let listener = TcpListener::bind(addr).await?;

        log::info!("HTTP API listening on http://{}", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/api/status", get(api_status))
            .merge(auth_router(self.auth.clone()))
            .merge(loan_router(self.auth.clone(), self.loans.clone()))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
    }
}

async fn api_status() -> ResponseJson<ApiResponse> {
    ResponseJson(ApiResponse {
        status: "ready".to_string(),
        message: format!("{} {} is running", crate::NAME, crate::VERSION),
    })
}

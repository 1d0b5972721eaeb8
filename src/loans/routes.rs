//! Loan REST API routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use super::{error::LoanError, models::*, service::LoanService};
use crate::auth::{
    middleware::{require_admin, require_auth},
    AuthContext, AuthState, MessageResponse,
};

/// Shared loan state
pub struct LoanState {
    pub loans: LoanService,
}

impl LoanState {
    pub fn new(loans: LoanService) -> Self {
        Self { loans }
    }

    /// Store loans next to the accounts of `auth`
    pub fn attach(auth: &AuthState) -> Result<Self, LoanError> {
        Ok(Self::new(LoanService::new(auth.sessions.db())?))
    }
}

/// Create loan router; every route needs a valid bearer token
pub fn loan_router(auth: Arc<AuthState>, state: Arc<LoanState>) -> Router {
    let admin = Router::new()
        .route("/admin/loans", get(list_loans))
        .route("/admin/loans/{id}/status", patch(review_loan))
        .route("/admin/loans/{id}", delete(delete_loan))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/loans", post(apply_for_loan))
        .route("/loans/{id}", get(view_loan))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(auth, require_auth))
        .with_state(state)
}

/// POST /loans - Apply for a loan
async fn apply_for_loan(
    State(state): State<Arc<LoanState>>,
    Extension(context): Extension<AuthContext>,
    Json(req): Json<LoanRequest>,
) -> Result<impl IntoResponse, LoanError> {
    let loan = state.loans.apply(&context.id, req)?;
    Ok((StatusCode::CREATED, Json(LoanResponse { loan })))
}

/// GET /loans/{id} - View a loan and its status
async fn view_loan(
    State(state): State<Arc<LoanState>>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LoanError> {
    let loan = state.loans.view(&context, &id)?;
    Ok(Json(LoanResponse { loan }))
}

/// GET /admin/loans - List loans by status and order
async fn list_loans(
    State(state): State<Arc<LoanState>>,
    Query(query): Query<LoanQuery>,
) -> Result<impl IntoResponse, LoanError> {
    let loans = state.loans.list(&query)?;
    Ok(Json(LoansResponse { loans }))
}

/// PATCH /admin/loans/{id}/status - Approve or reject
async fn review_loan(
    State(state): State<Arc<LoanState>>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<LoanStatusRequest>,
) -> Result<impl IntoResponse, LoanError> {
    state.loans.review(&context.id, &id, &req.status)?;
    Ok(Json(MessageResponse {
        message: "Loan status updated successfully".to_string(),
    }))
}

/// DELETE /admin/loans/{id}
async fn delete_loan(
    State(state): State<Arc<LoanState>>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LoanError> {
    state.loans.delete(&context.id, &id)?;
    Ok(Json(MessageResponse {
        message: "Loan deleted successfully".to_string(),
    }))
}

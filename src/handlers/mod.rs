//! HTTP request handlers

pub mod applicants;
pub mod middleware;
pub mod payments;
pub mod workflow;

pub use applicants::*;
pub use payments::*;
pub use workflow::*;

use crate::db::PgStore;
use crate::ledger::{LedgerError, PaymentLedger};
use crate::models::ApiResponse;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: PaymentLedger<PgStore>,
    /// Read-only applicant view the workflow hands off to
    pub detail_route_prefix: String,
    pub is_production: bool,
}

impl AppState {
    pub fn store(&self) -> &PgStore {
        self.ledger.store()
    }
}

pub type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

pub(crate) fn ok<T>(status: StatusCode, data: T) -> ApiResult<T> {
    (status, Json(ApiResponse::success(data)))
}

/// Map a ledger failure onto a status code and a message safe to show
pub(crate) fn failure<T>(err: LedgerError, action: &str) -> ApiResult<T> {
    let status = match &err {
        LedgerError::Validation(_) | LedgerError::Workflow(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::NotAuthorized => StatusCode::FORBIDDEN,
        LedgerError::Persistence(e) => {
            tracing::error!("Failed to {}: {}", action, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiResponse::error(err.to_string())))
}

/// Liveness check
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Routes mounted under `/api`; every one of them needs a session
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Applicant steps
        .route("/applicants", post(create_applicant))
        .route("/applicants/:id", get(get_applicant).put(update_applicant))
        .route("/applicants/:id/education", put(update_education))
        .route("/applicants/:id/processing", put(update_processing))
        .route("/applicants/:id/documents", post(add_document))
        .route("/applicants/:id/workflow", get(open_workflow))
        // Payments and dues
        .route(
            "/applicants/:id/payments",
            get(list_payments).post(commit_batch),
        )
        .route(
            "/applicants/:id/payments/:payment_id",
            delete(delete_payment),
        )
        .route("/applicants/:id/batches", get(list_batches))
        .route("/applicants/:id/batches/:batch_id", delete(delete_batch))
        .route(
            "/applicants/:id/batches/:batch_id/invoice",
            get(get_invoice),
        )
        .route(
            "/applicants/:id/agreement",
            get(get_agreement).put(set_agreement),
        )
        // Workflow navigation
        .route("/workflow/steps", get(list_steps))
        .route("/workflow/transition", post(transition))
        .layer(axum_middleware::from_fn(middleware::require_session))
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::security_headers,
        ))
}

/// Full application router without transport-level layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes(state.clone()))
        .with_state(state)
}

//! Payments & dues handlers
//!
//! Only callers whose workflow includes the dues step get here; the ledger
//! itself does no role checks.

use crate::db::LedgerStore;
use crate::handlers::{failure, ok, ApiResult, AppState};
use crate::ledger::invoice::Invoice;
use crate::ledger::{LedgerError, PaymentBatch, PaymentLedger, PendingBatch};
use crate::models::*;
use crate::validation::ValidationError;
use crate::workflow::Step;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CommittedBatch {
    pub batch_id: Uuid,
    /// Every payment of the applicant after the commit
    pub payments: Vec<Payment>,
    /// Invoice for the new batch carrying the request's comment; `None` when
    /// the payments were saved but the invoice could not be built
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Serialize)]
pub struct DeletedBatch {
    pub batch_id: Uuid,
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub comment: Option<String>,
}

fn require_dues_access(session: &SessionContext) -> Result<(), LedgerError> {
    if session.role.workflow_shape().contains(Step::Dues) {
        Ok(())
    } else {
        tracing::warn!(
            "User {} ({}) refused access to payments",
            session.user_id,
            session.role
        );
        Err(LedgerError::NotAuthorized)
    }
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Payment>> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "list payments");
    }
    match state.ledger.payments(id).await {
        Ok(payments) => ok(StatusCode::OK, payments),
        Err(e) => failure(e, "list payments"),
    }
}

/// Validate a request's lines into one batch, save it and build its invoice.
/// Every line is checked before the first insert.
pub(crate) async fn save_batch<S: LedgerStore>(
    ledger: &PaymentLedger<S>,
    applicant_id: Uuid,
    input: &CommitBatchRequest,
    date: NaiveDate,
) -> Result<CommittedBatch, LedgerError> {
    if ledger.store().get_applicant(applicant_id).await?.is_none() {
        return Err(LedgerError::NotFound("Applicant".to_string()));
    }

    let mut pending = match input.batch_id {
        Some(batch_id) => {
            PendingBatch::with_batch_id(applicant_id, batch_id, ledger.settings().currency_policy)
        }
        None => ledger.begin_batch(applicant_id),
    };

    for (i, line) in input.payments.iter().enumerate() {
        if let Err(e) = pending.add_payment(line) {
            return Err(ValidationError::Invalid(format!("Payment {}: {}", i + 1, e)).into());
        }
    }

    let payments = ledger.commit_batch(&pending).await?;
    let batch_id = pending.batch_id();
    let comment = input.comment.as_deref().unwrap_or_default();
    let invoice = match ledger
        .invoice_for_batch(applicant_id, batch_id, comment, date)
        .await
    {
        Ok(invoice) => Some(invoice),
        Err(e) => {
            tracing::warn!("Batch {} saved without an invoice: {}", batch_id, e);
            None
        }
    };

    Ok(CommittedBatch {
        batch_id,
        payments,
        invoice,
    })
}

pub async fn commit_batch(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<CommitBatchRequest>,
) -> ApiResult<CommittedBatch> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "save payments");
    }

    let today = chrono::Utc::now().date_naive();
    match save_batch(&state.ledger, id, &input, today).await {
        Ok(committed) => {
            tracing::info!(
                "User {} saved batch {} for applicant {}",
                session.user_id,
                committed.batch_id,
                id
            );
            ok(StatusCode::CREATED, committed)
        }
        Err(e) => failure(e, "save payments"),
    }
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, payment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Vec<Payment>> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "delete payment");
    }
    if let Err(e) = state.ledger.delete_payment(id, payment_id).await {
        return failure(e, "delete payment");
    }
    match state.ledger.payments(id).await {
        Ok(payments) => ok(StatusCode::OK, payments),
        Err(e) => failure(e, "list payments"),
    }
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, batch_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<DeletedBatch> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "delete batch");
    }
    match state.ledger.delete_batch(id, batch_id).await {
        Ok(removed) => ok(StatusCode::OK, DeletedBatch { batch_id, removed }),
        Err(e) => failure(e, "delete batch"),
    }
}

pub async fn list_batches(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PaymentBatch>> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "list batches");
    }
    match state.ledger.batches(id).await {
        Ok(batches) => ok(StatusCode::OK, batches),
        Err(e) => failure(e, "list batches"),
    }
}

/// Invoice for one saved batch, dated today
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, batch_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Invoice> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "build invoice");
    }
    let today = chrono::Utc::now().date_naive();
    let comment = query.comment.unwrap_or_default();
    match state
        .ledger
        .invoice_for_batch(id, batch_id, &comment, today)
        .await
    {
        Ok(invoice) => ok(StatusCode::OK, invoice),
        Err(e) => failure(e, "build invoice"),
    }
}

pub async fn get_agreement(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Option<Agreement>> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "load agreement");
    }
    match state.ledger.agreement(id).await {
        Ok(agreement) => ok(StatusCode::OK, agreement),
        Err(e) => failure(e, "load agreement"),
    }
}

pub async fn set_agreement(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetAgreement>,
) -> ApiResult<Agreement> {
    if let Err(e) = require_dues_access(&session) {
        return failure(e, "save agreement");
    }
    match state.store().get_applicant(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return failure(LedgerError::NotFound("Applicant".to_string()), "save agreement"),
        Err(e) => return failure(e.into(), "save agreement"),
    }
    match state
        .ledger
        .set_agreement(id, input.amount, input.currency.as_deref())
        .await
    {
        Ok(agreement) => ok(StatusCode::OK, agreement),
        Err(e) => failure(e, "save agreement"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::handlers::applicants::register;
    use crate::handlers::tests::send;
    use crate::ledger::LedgerSettings;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;

    async fn ledger_with_applicant() -> (PaymentLedger<MemoryStore>, Uuid) {
        let store = MemoryStore::new();
        let applicant = register(
            &store,
            &CreateApplicant {
                name: "Zainab Malik".to_string(),
                cnic: "61101-3333333-4".to_string(),
                phone_number: "+92 345 3333333".to_string(),
                email: None,
                address: "F-10, Islamabad".to_string(),
                city: "Islamabad".to_string(),
                country: "Pakistan".to_string(),
                qualification: "MSc".to_string(),
                counselor: "Usman".to_string(),
                visa_type: VisaType::WorkPermit,
                photo: None,
                branch_id: None,
            },
        )
        .await
        .unwrap();
        (PaymentLedger::new(store, LedgerSettings::default()), applicant.id)
    }

    fn request(batch_id: Option<Uuid>, amounts: &[&str], comment: Option<&str>) -> CommitBatchRequest {
        CommitBatchRequest {
            batch_id,
            payments: amounts
                .iter()
                .map(|a| NewPayment {
                    amount: Some(a.parse().unwrap()),
                    purpose: Some("Processing fee".to_string()),
                    currency: Some("USD".to_string()),
                    ..NewPayment::default()
                })
                .collect(),
            comment: comment.map(str::to_string),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    #[tokio::test]
    async fn test_save_batch_returns_invoice_with_comment() {
        let (ledger, id) = ledger_with_applicant().await;
        let input = request(None, &["300", "200"], Some("Paid at Lahore branch"));

        let committed = save_batch(&ledger, id, &input, today()).await.unwrap();
        assert_eq!(committed.payments.len(), 2);

        let invoice = committed.invoice.unwrap();
        assert_eq!(invoice.invoice_number, committed.batch_id);
        assert_eq!(invoice.comment, "Paid at Lahore branch");
        assert_eq!(invoice.date, today());
        assert_eq!(invoice.totals.grand_total, dec!(500));
        assert_eq!(invoice.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_save_batch_without_comment() {
        let (ledger, id) = ledger_with_applicant().await;
        let committed = save_batch(&ledger, id, &request(None, &["50"], None), today())
            .await
            .unwrap();
        assert_eq!(committed.invoice.unwrap().comment, "");
    }

    #[tokio::test]
    async fn test_save_batch_refuses_saved_batch_id() {
        let (ledger, id) = ledger_with_applicant().await;
        let first = save_batch(&ledger, id, &request(None, &["100"], None), today())
            .await
            .unwrap();

        let again = request(Some(first.batch_id), &["999"], None);
        assert!(matches!(
            save_batch(&ledger, id, &again, today()).await,
            Err(LedgerError::Validation(ValidationError::BatchAlreadySaved { .. }))
        ));
        assert_eq!(ledger.payments(id).await.unwrap().len(), 1);

        let fresh = Uuid::new_v4();
        let second = save_batch(&ledger, id, &request(Some(fresh), &["999"], None), today())
            .await
            .unwrap();
        assert_eq!(second.batch_id, fresh);
        assert_eq!(second.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_save_batch_checks_every_line_first() {
        let (ledger, id) = ledger_with_applicant().await;
        let input = request(None, &["100", "0.004"], None);
        let err = save_batch(&ledger, id, &input, today()).await.unwrap_err();
        assert!(err.to_string().contains("Payment 2"));
        assert_eq!(ledger.store().payment_count(), 0);

        assert!(matches!(
            save_batch(&ledger, Uuid::new_v4(), &request(None, &["10"], None), today()).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    fn sub_admin(method: &str, uri: String, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "sub-1")
            .header("x-user-role", "sub-admin")
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    #[test]
    fn test_dues_access_by_role() {
        let session = |role| SessionContext {
            user_id: "u".to_string(),
            role,
        };
        assert!(require_dues_access(&session(Role::Admin)).is_ok());
        assert!(require_dues_access(&session(Role::Manager)).is_ok());
        assert!(matches!(
            require_dues_access(&session(Role::SubAdmin)),
            Err(LedgerError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_sub_admin_refused_payment_routes() {
        let id = Uuid::new_v4();
        let batch = Uuid::new_v4();
        let requests = vec![
            sub_admin("GET", format!("/api/applicants/{}/payments", id), Body::empty()),
            sub_admin(
                "POST",
                format!("/api/applicants/{}/payments", id),
                Body::from(r#"{"payments":[{"amount":"100","purpose":"Fee","currency":"USD"}]}"#),
            ),
            sub_admin(
                "DELETE",
                format!("/api/applicants/{}/batches/{}", id, batch),
                Body::empty(),
            ),
            sub_admin(
                "GET",
                format!("/api/applicants/{}/batches/{}/invoice", id, batch),
                Body::empty(),
            ),
            sub_admin(
                "PUT",
                format!("/api/applicants/{}/agreement", id),
                Body::from(r#"{"amount":"1000","currency":"USD"}"#),
            ),
        ];

        for request in requests {
            let (status, body) = send(request).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body["error"], "Not authorized for payments and dues");
        }
    }
}

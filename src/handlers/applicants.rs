//! Applicant handlers: one endpoint per workflow step that owns data

use crate::db::LedgerStore;
use crate::handlers::{failure, ok, ApiResult, AppState};
use crate::ledger::LedgerError;
use crate::models::*;
use crate::validation::{
    dedupe_notes, validate_create_applicant, validate_document_ref, validate_education,
    validate_update_applicant,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

/// Validate and store a new applicant
pub(crate) async fn register<S: LedgerStore>(
    store: &S,
    input: &CreateApplicant,
) -> Result<Applicant, LedgerError> {
    validate_create_applicant(input)?;
    Ok(store.create_applicant(input).await?)
}

/// Validate one step's write and apply it. Processing notes are
/// de-duplicated before they are stored.
pub(crate) async fn save_step<S: LedgerStore>(
    store: &S,
    id: Uuid,
    update: ApplicantUpdate,
) -> Result<Applicant, LedgerError> {
    let update = match update {
        ApplicantUpdate::Personal(input) => {
            validate_update_applicant(&input)?;
            ApplicantUpdate::Personal(input)
        }
        ApplicantUpdate::Education(input) => {
            validate_education(&input)?;
            ApplicantUpdate::Education(input)
        }
        ApplicantUpdate::Processing(mut input) => {
            input.processing_notes = dedupe_notes(input.processing_notes);
            ApplicantUpdate::Processing(input)
        }
        ApplicantUpdate::AddDocument(input) => {
            validate_document_ref(&input)?;
            ApplicantUpdate::AddDocument(input)
        }
    };

    store.update_applicant(id, &update).await?.ok_or_else(not_found)
}

/// Intake: register a new applicant
pub async fn create_applicant(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<CreateApplicant>,
) -> ApiResult<Applicant> {
    match register(state.store(), &input).await {
        Ok(applicant) => {
            tracing::info!(
                "Applicant {} registered by {} ({})",
                applicant.id,
                session.user_id,
                applicant.visa_type.label()
            );
            ok(StatusCode::CREATED, applicant)
        }
        Err(e) => failure(e, "create applicant"),
    }
}

pub async fn get_applicant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Applicant> {
    match state.store().get_applicant(id).await {
        Ok(Some(applicant)) => ok(StatusCode::OK, applicant),
        Ok(None) => failure(not_found(), "load applicant"),
        Err(e) => failure(e.into(), "load applicant"),
    }
}

/// Personal info step
pub async fn update_applicant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateApplicant>,
) -> ApiResult<Applicant> {
    apply_update(&state, id, ApplicantUpdate::Personal(input), "update applicant").await
}

/// Study preferences step
pub async fn update_education(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<FutureEducationDetails>,
) -> ApiResult<Applicant> {
    apply_update(&state, id, ApplicantUpdate::Education(input), "update study preferences").await
}

/// Processing step: status, notes and the processing record
pub async fn update_processing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProcessing>,
) -> ApiResult<Applicant> {
    apply_update(&state, id, ApplicantUpdate::Processing(input), "update processing").await
}

/// Documents step: record where an uploaded file was stored
pub async fn add_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<DocumentRef>,
) -> ApiResult<Applicant> {
    apply_update(&state, id, ApplicantUpdate::AddDocument(input), "add document").await
}

async fn apply_update(
    state: &AppState,
    id: Uuid,
    update: ApplicantUpdate,
    action: &str,
) -> ApiResult<Applicant> {
    match save_step(state.store(), id, update).await {
        Ok(applicant) => {
            tracing::info!("Applicant {} updated ({})", id, action);
            ok(StatusCode::OK, applicant)
        }
        Err(e) => failure(e, action),
    }
}

fn not_found() -> LedgerError {
    LedgerError::NotFound("Applicant".to_string())
}

//! Workflow navigation handlers
//!
//! The client keeps the active step index between requests; each transition
//! rebuilds the coordinator from it.

use crate::db::LedgerStore;
use crate::handlers::{failure, ok, ApiResult, AppState};
use crate::ledger::LedgerError;
use crate::models::SessionContext;
use crate::workflow::{Step, Transition, WorkflowCoordinator, WorkflowShape};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct StepView {
    pub index: usize,
    pub step: Step,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WorkflowSteps {
    pub includes_dues_step: bool,
    pub steps: Vec<StepView>,
}

impl From<WorkflowShape> for WorkflowSteps {
    fn from(shape: WorkflowShape) -> Self {
        Self {
            includes_dues_step: shape.includes_dues_step,
            steps: shape
                .steps()
                .iter()
                .enumerate()
                .map(|(index, step)| StepView {
                    index,
                    step: *step,
                    label: step.label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionAction {
    Next,
    Prev,
    Jump { index: usize },
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub applicant_id: Uuid,
    pub active_index: usize,
    #[serde(flatten)]
    pub action: TransitionAction,
}

#[derive(Debug, Serialize)]
pub struct WorkflowView {
    pub applicant_id: Uuid,
    pub active_index: usize,
    pub active_step: Step,
    pub label: &'static str,
    pub labels: Vec<&'static str>,
    /// Set when the workflow is done and the console should leave it
    pub navigate_to: Option<String>,
}

impl WorkflowView {
    fn new(coordinator: &WorkflowCoordinator, navigate_to: Option<String>) -> Self {
        let step = coordinator.active_step();
        Self {
            applicant_id: coordinator.applicant_id(),
            active_index: coordinator.active_index(),
            active_step: step,
            label: step.label(),
            labels: coordinator.shape().labels(),
            navigate_to,
        }
    }
}

/// Step labels for the caller's capability level
pub async fn list_steps(Extension(session): Extension<SessionContext>) -> ApiResult<WorkflowSteps> {
    ok(StatusCode::OK, session.role.workflow_shape().into())
}

/// Open the workflow for an applicant; always lands on the first step
pub async fn open_workflow(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<WorkflowView> {
    match state.store().get_applicant(id).await {
        Ok(Some(applicant)) => {
            let coordinator =
                WorkflowCoordinator::for_applicant(&applicant, session.role.workflow_shape());
            ok(StatusCode::OK, WorkflowView::new(&coordinator, None))
        }
        Ok(None) => failure(LedgerError::NotFound("Applicant".to_string()), "open workflow"),
        Err(e) => failure(e.into(), "open workflow"),
    }
}

pub async fn transition(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<TransitionRequest>,
) -> ApiResult<WorkflowView> {
    let shape = session.role.workflow_shape();
    let mut coordinator =
        match WorkflowCoordinator::resume(input.applicant_id, shape, input.active_index) {
            Ok(c) => c,
            Err(e) => return failure(e.into(), "change step"),
        };

    let moved = match input.action {
        TransitionAction::Next => coordinator.next(),
        TransitionAction::Prev => coordinator.prev(),
        TransitionAction::Jump { index } => {
            let from = coordinator.active_step();
            match coordinator.jump_to(index) {
                Ok(to) => Transition::Moved { from, to },
                Err(e) => return failure(e.into(), "change step"),
            }
        }
    };

    let navigate_to = match moved {
        Transition::Moved { from, to } => {
            tracing::debug!(
                "Applicant {}: {} -> {}",
                input.applicant_id,
                from.label(),
                to.label()
            );
            None
        }
        Transition::Stayed(step) => {
            tracing::debug!("Applicant {} stays on {}", input.applicant_id, step.label());
            None
        }
        Transition::Finished { applicant_id } => {
            tracing::info!("User {} finished the workflow for applicant {}", session.user_id, applicant_id);
            Some(format!("{}/{}", state.detail_route_prefix, applicant_id))
        }
    };

    ok(StatusCode::OK, WorkflowView::new(&coordinator, navigate_to))
}

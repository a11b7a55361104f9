//! Applicant workflow
//!
//! A fixed, linear sequence of steps the console walks an applicant through.
//! The coordinator only tracks which step is active; every step saves its
//! own data before asking to move.

use crate::models::{Applicant, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    PersonalInfo,
    Documents,
    StudyPreferences,
    Processing,
    Dues,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::PersonalInfo => "Personal Info",
            Step::Documents => "Documents",
            Step::StudyPreferences => "Study Preferences",
            Step::Processing => "Processing",
            Step::Dues => "Payments & Dues",
        }
    }
}

const ALL_STEPS: [Step; 5] = [
    Step::PersonalInfo,
    Step::Documents,
    Step::StudyPreferences,
    Step::Processing,
    Step::Dues,
];

/// Which steps exist for a capability level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowShape {
    pub includes_dues_step: bool,
}

impl WorkflowShape {
    pub const FULL: WorkflowShape = WorkflowShape {
        includes_dues_step: true,
    };
    pub const WITHOUT_DUES: WorkflowShape = WorkflowShape {
        includes_dues_step: false,
    };

    pub fn steps(&self) -> &'static [Step] {
        if self.includes_dues_step {
            &ALL_STEPS
        } else {
            &ALL_STEPS[..4]
        }
    }

    pub fn len(&self) -> usize {
        self.steps().len()
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps().contains(&step)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.steps().iter().map(Step::label).collect()
    }
}

impl Role {
    pub fn workflow_shape(&self) -> WorkflowShape {
        WorkflowShape::from(*self)
    }
}

impl From<Role> for WorkflowShape {
    fn from(role: Role) -> Self {
        match role {
            Role::SubAdmin => WorkflowShape::WITHOUT_DUES,
            Role::Admin | Role::Manager => WorkflowShape::FULL,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Step {index} does not exist (workflow has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },
}

/// Result of asking the coordinator to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: Step, to: Step },
    /// Request refused; the active step did not change
    Stayed(Step),
    /// `next` on the last step: leave the workflow for the applicant's
    /// read-only detail view
    Finished { applicant_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct WorkflowCoordinator {
    applicant_id: Uuid,
    shape: WorkflowShape,
    active: usize,
}

impl WorkflowCoordinator {
    /// Always opens on the first step
    pub fn new(applicant_id: Uuid, shape: WorkflowShape) -> Self {
        Self {
            applicant_id,
            shape,
            active: 0,
        }
    }

    /// The applicant's stored status does not pick the opening step
    pub fn for_applicant(applicant: &Applicant, shape: WorkflowShape) -> Self {
        Self::new(applicant.id, shape)
    }

    /// Rebuild a coordinator whose active step the client kept
    pub fn resume(applicant_id: Uuid, shape: WorkflowShape, active: usize) -> Result<Self, WorkflowError> {
        let mut coordinator = Self::new(applicant_id, shape);
        coordinator.jump_to(active)?;
        Ok(coordinator)
    }

    pub fn applicant_id(&self) -> Uuid {
        self.applicant_id
    }

    pub fn shape(&self) -> WorkflowShape {
        self.shape
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_step(&self) -> Step {
        self.shape.steps()[self.active]
    }

    pub fn is_first(&self) -> bool {
        self.active == 0
    }

    pub fn is_last(&self) -> bool {
        self.active + 1 == self.shape.len()
    }

    pub fn next(&mut self) -> Transition {
        if self.is_last() {
            return Transition::Finished {
                applicant_id: self.applicant_id,
            };
        }
        let from = self.active_step();
        self.active += 1;
        Transition::Moved {
            from,
            to: self.active_step(),
        }
    }

    pub fn prev(&mut self) -> Transition {
        if self.is_first() {
            return Transition::Stayed(self.active_step());
        }
        let from = self.active_step();
        self.active -= 1;
        Transition::Moved {
            from,
            to: self.active_step(),
        }
    }

    /// Select any step directly; earlier steps need not be complete
    pub fn jump_to(&mut self, index: usize) -> Result<Step, WorkflowError> {
        let len = self.shape.len();
        if index >= len {
            return Err(WorkflowError::StepOutOfRange { index, len });
        }
        self.active = index;
        Ok(self.active_step())
    }
}

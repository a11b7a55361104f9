//! Data models for the application

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "visa_type", rename_all = "snake_case")]
pub enum VisaType {
    #[serde(rename = "Work Permit")]
    WorkPermit,
    #[serde(rename = "Student Visa")]
    StudentVisa,
    #[serde(rename = "Visit Visa")]
    VisitVisa,
}

impl VisaType {
    pub fn label(&self) -> &'static str {
        match self {
            VisaType::WorkPermit => "Work Permit",
            VisaType::StudentVisa => "Student Visa",
            VisaType::VisitVisa => "Visit Visa",
        }
    }

    /// Whether the study-preferences record carries meaning for this visa type
    pub fn is_education_oriented(&self) -> bool {
        matches!(self, VisaType::StudentVisa)
    }
}

/// Capability level of the signed-in console user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    Manager,
    SubAdmin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "sub-admin" | "subadmin" | "sub_admin" => Ok(Role::SubAdmin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::SubAdmin => "sub-admin",
        };
        f.write_str(s)
    }
}

/// Caller identity, resolved once per request by the session middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub role: Role,
}

// =============================================================================
// Applicant sub-records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingNote {
    pub note: String,
    pub save_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DocumentRef {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 2048))]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FutureEducationDetails {
    #[validate(length(max = 255))]
    pub country: String,
    #[validate(length(max = 255))]
    pub city: String,
    #[validate(length(max = 255))]
    pub institute: String,
    #[validate(length(max = 255))]
    pub course: String,
    #[validate(length(max = 64))]
    pub intake: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
}

fn pending() -> String {
    "Pending".to_string()
}

/// Attestation stages; every stage starts out as "Pending"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attestation {
    pub board: String,
    pub ibcc: String,
    pub hec: String,
    pub mofa: String,
    pub consulate: String,
    pub apostille: String,
    pub file_preparation: String,
    pub embassy_appointment_file: Option<String>,
    pub file_to_embassy: Option<String>,
}

impl Default for Attestation {
    fn default() -> Self {
        Self {
            board: pending(),
            ibcc: pending(),
            hec: pending(),
            mofa: pending(),
            consulate: pending(),
            apostille: pending(),
            file_preparation: pending(),
            embassy_appointment_file: None,
            file_to_embassy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingRecord {
    pub attestation: Attestation,
    pub visa_status: String,
    pub apply_for_offer_letter: bool,
    pub offer_letter_received: bool,
    pub offer_letter: Option<FileRef>,
    pub confirmation_invoice: Option<FileRef>,
    pub embassy_appointment: Option<FileRef>,
}

impl Default for ProcessingRecord {
    fn default() -> Self {
        Self {
            attestation: Attestation::default(),
            visa_status: pending(),
            apply_for_offer_letter: false,
            offer_letter_received: false,
            offer_letter: None,
            confirmation_invoice: None,
            embassy_appointment: None,
        }
    }
}

// =============================================================================
// Agreement
// =============================================================================

/// Contracted total fee, tracked apart from the payments actually received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAgreement {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

// =============================================================================
// Applicant
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Applicant {
    pub id: Uuid,
    pub name: String,
    pub cnic: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub country: String,
    pub qualification: String,
    pub counselor: String,
    pub visa_type: VisaType,
    pub photo: Option<String>,
    pub branch_id: Option<Uuid>,
    pub status: String,
    pub processing_notes: Vec<ProcessingNote>,
    pub documents: Vec<DocumentRef>,
    pub future_education: Option<FutureEducationDetails>,
    pub agreement: Option<Agreement>,
    pub processing: ProcessingRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApplicant {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub cnic: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub phone_number: String,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub city: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub country: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub qualification: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub counselor: String,
    pub visa_type: VisaType,
    pub photo: Option<String>,
    pub branch_id: Option<Uuid>,
}

/// Personal-info step update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateApplicant {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 64))]
    pub cnic: Option<String>,
    #[validate(length(max = 64))]
    pub phone_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 255))]
    pub city: Option<String>,
    #[validate(length(max = 255))]
    pub country: Option<String>,
    #[validate(length(max = 255))]
    pub qualification: Option<String>,
    #[validate(length(max = 255))]
    pub counselor: Option<String>,
    pub visa_type: Option<VisaType>,
    pub photo: Option<String>,
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProcessing {
    pub status: Option<String>,
    #[serde(default)]
    pub processing_notes: Vec<ProcessingNote>,
    #[serde(default)]
    pub processing: ProcessingRecord,
}

/// One workflow step's write against the applicant record
#[derive(Debug, Clone)]
pub enum ApplicantUpdate {
    Personal(UpdateApplicant),
    Education(FutureEducationDetails),
    Processing(UpdateProcessing),
    AddDocument(DocumentRef),
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub batch_id: Uuid,
    pub amount: Decimal,
    pub purpose: String,
    pub currency: String,
    pub rate: Option<Decimal>,
    pub refundable: bool,
    pub created_at: DateTime<Utc>,
}

/// Payment line as entered on the dues form, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPayment {
    pub amount: Option<Decimal>,
    pub purpose: Option<String>,
    pub currency: Option<String>,
    pub rate: Option<Decimal>,
    #[serde(default, deserialize_with = "yes_no_flag")]
    pub refundable: bool,
    pub batch_id: Option<Uuid>,
}

/// Validated payment line waiting in a pending batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentDraft {
    pub amount: Decimal,
    pub purpose: String,
    pub currency: String,
    pub rate: Option<Decimal>,
    pub refundable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitBatchRequest {
    pub batch_id: Option<Uuid>,
    pub payments: Vec<NewPayment>,
    pub comment: Option<String>,
}

/// Accepts either a JSON boolean or the form's "yes"/"no" strings
fn yes_no_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "refundable must be yes or no, got '{}'",
                other
            ))),
        },
    }
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

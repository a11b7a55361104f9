//! Input validation module

use crate::models::{
    Agreement, CreateApplicant, DocumentRef, FutureEducationDetails, NewPayment, PaymentDraft,
    ProcessingNote, UpdateApplicant,
};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Currencies offered on the dues form
pub const KNOWN_CURRENCIES: &[&str] = &["PKR", "USD", "GBP", "EUR", "AUD"];

/// 10^12: money columns are NUMERIC(14,2)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// 10^10: the rate column is NUMERIC(14,4)
pub const MAX_RATE: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Currency used when an applicant has no agreement yet
pub const DEFAULT_AGREEMENT_CURRENCY: &str = "USD";

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' must be a positive number")]
    NotPositive { field: String },

    #[error("Field '{field}' must be less than {max}")]
    TooLarge { field: String, max: Decimal },

    #[error("Field '{field}' must not be negative")]
    Negative { field: String },

    #[error("Invalid currency code: {code}")]
    InvalidCurrency { code: String },

    #[error("Batch is in {expected}; a {found} payment cannot be added to it")]
    MixedCurrency { expected: String, found: String },

    #[error("Payment belongs to a different batch")]
    BatchMismatch,

    #[error("Batch {batch_id} is already saved; start a new batch")]
    BatchAlreadySaved { batch_id: Uuid },

    #[error("Please add at least one payment")]
    EmptyBatch,

    #[error("Amount {amount} has a fractional part and cannot be written in words")]
    FractionalAmount { amount: Decimal },

    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl From<ValidationErrors> for ValidationError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
                format!("{} ({})", field, codes.join(", "))
            })
            .collect();
        fields.sort();
        ValidationError::Invalid(fields.join("; "))
    }
}

/// Validate a payment line from the dues form and normalise it
pub fn validate_new_payment(input: &NewPayment) -> Result<PaymentDraft, ValidationError> {
    let amount = input
        .amount
        .ok_or_else(|| ValidationError::Required {
            field: "amount".to_string(),
        })?
        .round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "amount".to_string(),
        });
    }
    check_upper_bound("amount", amount, MAX_AMOUNT)?;

    let purpose = required_text("purpose", input.purpose.as_deref())?;
    if purpose.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "purpose".to_string(),
            max: 500,
        });
    }

    let currency = validate_currency(input.currency.as_deref())?;

    let rate = match input.rate.map(|r| r.round_dp(4)) {
        Some(rate) if rate < Decimal::ZERO => {
            return Err(ValidationError::Negative {
                field: "rate".to_string(),
            })
        }
        Some(rate) => Some(check_upper_bound("rate", rate, MAX_RATE)?),
        None => None,
    };

    Ok(PaymentDraft {
        amount,
        purpose,
        currency,
        rate,
        refundable: input.refundable,
    })
}

fn check_upper_bound(field: &str, value: Decimal, max: Decimal) -> Result<Decimal, ValidationError> {
    if value >= max {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validate an agreement update; the amount may be zero but not negative
pub fn validate_agreement(
    amount: Option<Decimal>,
    currency: Option<&str>,
) -> Result<Agreement, ValidationError> {
    let amount = amount
        .ok_or_else(|| ValidationError::Required {
            field: "amount".to_string(),
        })?
        .round_dp(2);
    if amount < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "amount".to_string(),
        });
    }
    check_upper_bound("amount", amount, MAX_AMOUNT)?;

    let currency = match currency {
        Some(code) => validate_currency(Some(code))?,
        None => DEFAULT_AGREEMENT_CURRENCY.to_string(),
    };

    Ok(Agreement {
        amount,
        currency,
    })
}

/// Currency codes are three ASCII letters, stored upper-case
pub fn validate_currency(code: Option<&str>) -> Result<String, ValidationError> {
    let code = required_text("currency", code)?.to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidCurrency { code });
    }
    if !KNOWN_CURRENCIES.contains(&code.as_str()) {
        tracing::warn!("Currency {} is not offered on the dues form", code);
    }
    Ok(code)
}

pub fn validate_create_applicant(input: &CreateApplicant) -> Result<(), ValidationError> {
    if input.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    input.validate()?;
    Ok(())
}

pub fn validate_update_applicant(input: &UpdateApplicant) -> Result<(), ValidationError> {
    if matches!(input.name.as_deref(), Some(name) if name.trim().is_empty()) {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    input.validate()?;
    Ok(())
}

pub fn validate_education(input: &FutureEducationDetails) -> Result<(), ValidationError> {
    input.validate()?;
    Ok(())
}

pub fn validate_document_ref(input: &DocumentRef) -> Result<(), ValidationError> {
    input.validate()?;
    Ok(())
}

/// Drop blank notes and notes repeated with the same text and timestamp
pub fn dedupe_notes(notes: Vec<ProcessingNote>) -> Vec<ProcessingNote> {
    let mut kept: Vec<ProcessingNote> = Vec::with_capacity(notes.len());
    for note in notes {
        if note.note.trim().is_empty() {
            continue;
        }
        if kept
            .iter()
            .any(|n| n.note == note.note && n.save_time == note.save_time)
        {
            tracing::debug!("Duplicate processing note dropped");
            continue;
        }
        kept.push(note);
    }
    kept
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}

//! Payment ledger
//!
//! Payments are entered into a [`PendingBatch`] on the dues screen and only
//! reach the store when the batch is committed. Agreements are kept apart
//! from payments; invoices are derived from both on every request.

pub mod format;
pub mod invoice;
pub mod words;

use crate::db::{LedgerStore, StoreError};
use crate::models::{Agreement, NewPayment, Payment, PaymentDraft};
use crate::validation::{validate_agreement, validate_new_payment, ValidationError};
use crate::workflow::WorkflowError;
use chrono::NaiveDate;
use invoice::{build_invoice, Invoice, InvoiceInput};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use words::AmountWordsMode;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Could not save changes, please try again")]
    Persistence(#[source] StoreError),

    #[error("Not authorized for payments and dues")]
    NotAuthorized,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Persistence(err)
    }
}

/// Whether one batch may mix currencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchCurrencyPolicy {
    /// Every payment must use the batch's first currency
    #[default]
    Single,
    /// Mixed batches are accepted; invoices list a subtotal per currency
    Mixed,
}

impl FromStr for BatchCurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(BatchCurrencyPolicy::Single),
            "mixed" => Ok(BatchCurrencyPolicy::Mixed),
            other => Err(format!("unknown batch currency policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSettings {
    pub currency_policy: BatchCurrencyPolicy,
    pub words_mode: AmountWordsMode,
}

/// Payments entered for one applicant but not yet saved.
///
/// A failed commit leaves the batch untouched so nothing typed is lost.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    applicant_id: Uuid,
    batch_id: Uuid,
    policy: BatchCurrencyPolicy,
    lines: Vec<PaymentDraft>,
}

impl PendingBatch {
    pub fn new(applicant_id: Uuid, policy: BatchCurrencyPolicy) -> Self {
        Self::with_batch_id(applicant_id, Uuid::new_v4(), policy)
    }

    pub fn with_batch_id(applicant_id: Uuid, batch_id: Uuid, policy: BatchCurrencyPolicy) -> Self {
        Self {
            applicant_id,
            batch_id,
            policy,
            lines: Vec::new(),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn lines(&self) -> &[PaymentDraft] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Validate and append one payment line
    pub fn add_payment(&mut self, input: &NewPayment) -> Result<&PaymentDraft, ValidationError> {
        if matches!(input.batch_id, Some(id) if id != self.batch_id) {
            return Err(ValidationError::BatchMismatch);
        }

        let draft = validate_new_payment(input)?;

        if self.policy == BatchCurrencyPolicy::Single {
            if let Some(first) = self.lines.first() {
                if first.currency != draft.currency {
                    return Err(ValidationError::MixedCurrency {
                        expected: first.currency.clone(),
                        found: draft.currency,
                    });
                }
            }
        }

        self.lines.push(draft);
        Ok(&self.lines[self.lines.len() - 1])
    }
}

/// Payments of one batch, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentBatch {
    pub batch_id: Uuid,
    pub payments: Vec<Payment>,
}

/// Group payments by batch id in order of each batch's first payment
pub fn group_batches(payments: Vec<Payment>) -> Vec<PaymentBatch> {
    let mut batches: Vec<PaymentBatch> = Vec::new();
    for payment in payments {
        match batches.iter_mut().find(|b| b.batch_id == payment.batch_id) {
            Some(batch) => batch.payments.push(payment),
            None => batches.push(PaymentBatch {
                batch_id: payment.batch_id,
                payments: vec![payment],
            }),
        }
    }
    batches
}

#[derive(Clone)]
pub struct PaymentLedger<S> {
    store: S,
    settings: LedgerSettings,
}

impl<S: LedgerStore> PaymentLedger<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start an empty batch with a fresh batch id
    pub fn begin_batch(&self, applicant_id: Uuid) -> PendingBatch {
        PendingBatch::new(applicant_id, self.settings.currency_policy)
    }

    /// Persist every pending line in order and return the applicant's full
    /// payment list. Stops at the first failed insert; lines already saved
    /// stay saved.
    ///
    /// A saved batch is never extended: a batch id that already has payments
    /// is refused, and a retry after a failed commit needs a fresh batch.
    pub async fn commit_batch(&self, pending: &PendingBatch) -> Result<Vec<Payment>, LedgerError> {
        if pending.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        let existing = self.store.list_payments(pending.applicant_id).await?;
        if existing.iter().any(|p| p.batch_id == pending.batch_id) {
            return Err(ValidationError::BatchAlreadySaved {
                batch_id: pending.batch_id,
            }
            .into());
        }

        for (i, line) in pending.lines().iter().enumerate() {
            if let Err(e) = self
                .store
                .insert_payment(pending.applicant_id, pending.batch_id, line)
                .await
            {
                tracing::error!(
                    "Saving payment {} of {} in batch {} failed: {}",
                    i + 1,
                    pending.len(),
                    pending.batch_id,
                    e
                );
                return Err(LedgerError::Persistence(e));
            }
        }

        tracing::info!(
            "Committed batch {} ({} payments) for applicant {}",
            pending.batch_id,
            pending.len(),
            pending.applicant_id
        );

        Ok(self.store.list_payments(pending.applicant_id).await?)
    }

    pub async fn payments(&self, applicant_id: Uuid) -> Result<Vec<Payment>, LedgerError> {
        Ok(self.store.list_payments(applicant_id).await?)
    }

    pub async fn batches(&self, applicant_id: Uuid) -> Result<Vec<PaymentBatch>, LedgerError> {
        Ok(group_batches(self.store.list_payments(applicant_id).await?))
    }

    pub async fn delete_payment(&self, applicant_id: Uuid, payment_id: Uuid) -> Result<(), LedgerError> {
        if !self.store.delete_payment(applicant_id, payment_id).await? {
            return Err(LedgerError::NotFound("Payment".to_string()));
        }
        tracing::info!("Deleted payment {} of applicant {}", payment_id, applicant_id);
        Ok(())
    }

    /// Remove every payment in the batch. Deleting an empty batch is a no-op.
    pub async fn delete_batch(&self, applicant_id: Uuid, batch_id: Uuid) -> Result<u64, LedgerError> {
        let removed = self.store.delete_batch(applicant_id, batch_id).await?;
        tracing::info!(
            "Deleted batch {} of applicant {} ({} payments)",
            batch_id,
            applicant_id,
            removed
        );
        Ok(removed)
    }

    pub async fn agreement(&self, applicant_id: Uuid) -> Result<Option<Agreement>, LedgerError> {
        Ok(self.store.get_agreement(applicant_id).await?)
    }

    pub async fn set_agreement(
        &self,
        applicant_id: Uuid,
        amount: Option<Decimal>,
        currency: Option<&str>,
    ) -> Result<Agreement, LedgerError> {
        let agreement = validate_agreement(amount, currency)?;
        let saved = self.store.put_agreement(applicant_id, &agreement).await?;
        tracing::info!(
            "Agreement for applicant {} set to {} {}",
            applicant_id,
            saved.amount,
            saved.currency
        );
        Ok(saved)
    }

    /// Build the printable invoice for one saved batch
    pub async fn invoice_for_batch(
        &self,
        applicant_id: Uuid,
        batch_id: Uuid,
        comment: &str,
        date: NaiveDate,
    ) -> Result<Invoice, LedgerError> {
        let applicant = self
            .store
            .get_applicant(applicant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("Applicant".to_string()))?;

        let payments: Vec<Payment> = self
            .store
            .list_payments(applicant_id)
            .await?
            .into_iter()
            .filter(|p| p.batch_id == batch_id)
            .collect();

        let agreement = match applicant.agreement.clone() {
            Some(a) => Some(a),
            None => self.store.get_agreement(applicant_id).await?,
        };

        build_invoice(
            InvoiceInput {
                applicant: &applicant,
                batch_id,
                payments: &payments,
                agreement: agreement.as_ref(),
                comment,
                date,
            },
            self.settings.words_mode,
        )?
        .ok_or_else(|| LedgerError::NotFound("Batch".to_string()))
    }
}

//! In-memory store for tests

use super::{LedgerStore, StoreError};
use crate::models::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    applicants: HashMap<Uuid, Applicant>,
    payments: Vec<Payment>,
    agreements: HashMap<Uuid, Agreement>,
    /// Number of inserts to accept before failing; `None` never fails
    inserts_before_failure: Option<usize>,
    fail_deletes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` more payment inserts, then fail every following one
    pub fn fail_inserts_after(&self, n: usize) {
        self.inner.lock().unwrap().inserts_before_failure = Some(n);
    }

    pub fn fail_deletes(&self) {
        self.inner.lock().unwrap().fail_deletes = true;
    }

    pub fn payment_count(&self) -> usize {
        self.inner.lock().unwrap().payments.len()
    }
}

/// Same as `COALESCE($n, column)`
fn set_if_some(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{} failed", what))
}

impl LedgerStore for MemoryStore {
    async fn get_applicant(&self, id: Uuid) -> Result<Option<Applicant>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.applicants.get(&id).cloned().map(|mut a| {
            a.agreement = inner.agreements.get(&id).cloned();
            a
        }))
    }

    async fn create_applicant(&self, input: &CreateApplicant) -> Result<Applicant, StoreError> {
        let now = Utc::now();
        let applicant = Applicant {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            cnic: input.cnic.clone(),
            phone_number: input.phone_number.clone(),
            email: input.email.clone(),
            address: input.address.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
            qualification: input.qualification.clone(),
            counselor: input.counselor.clone(),
            visa_type: input.visa_type,
            photo: input.photo.clone(),
            branch_id: input.branch_id,
            status: "Pending".to_string(),
            processing_notes: Vec::new(),
            documents: Vec::new(),
            future_education: None,
            agreement: None,
            processing: ProcessingRecord::default(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .applicants
            .insert(applicant.id, applicant.clone());
        Ok(applicant)
    }

    async fn update_applicant(
        &self,
        id: Uuid,
        update: &ApplicantUpdate,
    ) -> Result<Option<Applicant>, StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            let Some(applicant) = inner.applicants.get_mut(&id) else {
                return Ok(None);
            };
            match update {
                ApplicantUpdate::Personal(input) => {
                    set_if_some(&mut applicant.name, &input.name);
                    set_if_some(&mut applicant.cnic, &input.cnic);
                    set_if_some(&mut applicant.phone_number, &input.phone_number);
                    set_if_some(&mut applicant.address, &input.address);
                    set_if_some(&mut applicant.city, &input.city);
                    set_if_some(&mut applicant.country, &input.country);
                    set_if_some(&mut applicant.qualification, &input.qualification);
                    set_if_some(&mut applicant.counselor, &input.counselor);
                    if input.email.is_some() {
                        applicant.email = input.email.clone();
                    }
                    if input.photo.is_some() {
                        applicant.photo = input.photo.clone();
                    }
                    if let Some(visa_type) = input.visa_type {
                        applicant.visa_type = visa_type;
                    }
                    if let Some(branch_id) = input.branch_id {
                        applicant.branch_id = Some(branch_id);
                    }
                }
                ApplicantUpdate::Education(details) => {
                    applicant.future_education = Some(details.clone());
                }
                ApplicantUpdate::Processing(input) => {
                    if let Some(status) = &input.status {
                        applicant.status = status.clone();
                    }
                    applicant.processing_notes = input.processing_notes.clone();
                    applicant.processing = input.processing.clone();
                }
                ApplicantUpdate::AddDocument(doc) => applicant.documents.push(doc.clone()),
            }
            applicant.updated_at = Utc::now();
        }
        self.get_applicant(id).await
    }

    async fn list_payments(&self, applicant_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payments
            .iter()
            .filter(|p| p.applicant_id == applicant_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(
        &self,
        applicant_id: Uuid,
        batch_id: Uuid,
        draft: &PaymentDraft,
    ) -> Result<Payment, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(remaining) = inner.inserts_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(unavailable("insert"));
            }
            *remaining -= 1;
        }
        let payment = Payment {
            id: Uuid::new_v4(),
            applicant_id,
            batch_id,
            amount: draft.amount,
            purpose: draft.purpose.clone(),
            currency: draft.currency.clone(),
            rate: draft.rate,
            refundable: draft.refundable,
            created_at: Utc::now(),
        };
        inner.payments.push(payment.clone());
        Ok(payment)
    }

    async fn delete_payment(&self, applicant_id: Uuid, payment_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_deletes {
            return Err(unavailable("delete"));
        }
        let before = inner.payments.len();
        inner
            .payments
            .retain(|p| !(p.id == payment_id && p.applicant_id == applicant_id));
        Ok(inner.payments.len() < before)
    }

    async fn delete_batch(&self, applicant_id: Uuid, batch_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_deletes {
            return Err(unavailable("delete"));
        }
        let before = inner.payments.len();
        inner
            .payments
            .retain(|p| !(p.batch_id == batch_id && p.applicant_id == applicant_id));
        Ok((before - inner.payments.len()) as u64)
    }

    async fn get_agreement(&self, applicant_id: Uuid) -> Result<Option<Agreement>, StoreError> {
        Ok(self.inner.lock().unwrap().agreements.get(&applicant_id).cloned())
    }

    async fn put_agreement(
        &self,
        applicant_id: Uuid,
        agreement: &Agreement,
    ) -> Result<Agreement, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .agreements
            .insert(applicant_id, agreement.clone());
        Ok(agreement.clone())
    }
}

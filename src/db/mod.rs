//! Persistence: the store the ledger and workflow steps read and write through

mod pool;
mod postgres;

#[cfg(test)]
pub mod memory;

pub use pool::{create_pool, run_migrations};
pub use postgres::PgStore;

use crate::models::{
    Agreement, Applicant, ApplicantUpdate, CreateApplicant, Payment, PaymentDraft,
};
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Applicant, payment and agreement records as the console sees them.
///
/// Payments come back in insertion order. Deletes report whether anything
/// was removed instead of failing on absent rows.
pub trait LedgerStore: Send + Sync {
    fn get_applicant(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Applicant>, StoreError>> + Send;

    fn create_applicant(
        &self,
        input: &CreateApplicant,
    ) -> impl Future<Output = Result<Applicant, StoreError>> + Send;

    fn update_applicant(
        &self,
        id: Uuid,
        update: &ApplicantUpdate,
    ) -> impl Future<Output = Result<Option<Applicant>, StoreError>> + Send;

    fn list_payments(
        &self,
        applicant_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Payment>, StoreError>> + Send;

    fn insert_payment(
        &self,
        applicant_id: Uuid,
        batch_id: Uuid,
        draft: &PaymentDraft,
    ) -> impl Future<Output = Result<Payment, StoreError>> + Send;

    fn delete_payment(
        &self,
        applicant_id: Uuid,
        payment_id: Uuid,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn delete_batch(
        &self,
        applicant_id: Uuid,
        batch_id: Uuid,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn get_agreement(
        &self,
        applicant_id: Uuid,
    ) -> impl Future<Output = Result<Option<Agreement>, StoreError>> + Send;

    fn put_agreement(
        &self,
        applicant_id: Uuid,
        agreement: &Agreement,
    ) -> impl Future<Output = Result<Agreement, StoreError>> + Send;
}

//! PostgreSQL-backed store

use super::{LedgerStore, StoreError};
use crate::models::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const APPLICANT_SELECT: &str = r#"
    SELECT a.id, a.name, a.cnic, a.phone_number, a.email, a.address, a.city, a.country,
           a.qualification, a.counselor, a.visa_type, a.photo, a.branch_id, a.status,
           a.processing_notes, a.documents, a.future_education, a.processing,
           a.created_at, a.updated_at,
           ag.amount AS agreed_amount, ag.currency AS agreed_currency
    FROM applicants a
    LEFT JOIN agreements ag ON ag.applicant_id = a.id
    WHERE a.id = $1
"#;

const PAYMENT_COLUMNS: &str =
    "id, applicant_id, batch_id, amount, purpose, currency, rate, refundable, created_at";

#[derive(Debug, FromRow)]
struct ApplicantRow {
    id: Uuid,
    name: String,
    cnic: String,
    phone_number: String,
    email: Option<String>,
    address: String,
    city: String,
    country: String,
    qualification: String,
    counselor: String,
    visa_type: VisaType,
    photo: Option<String>,
    branch_id: Option<Uuid>,
    status: String,
    processing_notes: Json<Vec<ProcessingNote>>,
    documents: Json<Vec<DocumentRef>>,
    future_education: Option<Json<FutureEducationDetails>>,
    processing: Json<ProcessingRecord>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    agreed_amount: Option<Decimal>,
    agreed_currency: Option<String>,
}

impl From<ApplicantRow> for Applicant {
    fn from(row: ApplicantRow) -> Self {
        let agreement = match (row.agreed_amount, row.agreed_currency) {
            (Some(amount), Some(currency)) => Some(Agreement { amount, currency }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            cnic: row.cnic,
            phone_number: row.phone_number,
            email: row.email,
            address: row.address,
            city: row.city,
            country: row.country,
            qualification: row.qualification,
            counselor: row.counselor,
            visa_type: row.visa_type,
            photo: row.photo,
            branch_id: row.branch_id,
            status: row.status,
            processing_notes: row.processing_notes.0,
            documents: row.documents.0,
            future_education: row.future_education.map(|j| j.0),
            agreement,
            processing: row.processing.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AgreementRow {
    amount: Decimal,
    currency: String,
}

/// Store over a shared connection pool; clones share the pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LedgerStore for PgStore {
    async fn get_applicant(&self, id: Uuid) -> Result<Option<Applicant>, StoreError> {
        let row = sqlx::query_as::<_, ApplicantRow>(APPLICANT_SELECT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Applicant::from))
    }

    async fn create_applicant(&self, input: &CreateApplicant) -> Result<Applicant, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO applicants (
                name, cnic, phone_number, email, address, city, country,
                qualification, counselor, visa_type, photo, branch_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.cnic)
        .bind(&input.phone_number)
        .bind(&input.email)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.qualification)
        .bind(&input.counselor)
        .bind(input.visa_type)
        .bind(&input.photo)
        .bind(input.branch_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_applicant(id)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("applicant {} not readable after insert", id)))
    }

    async fn update_applicant(
        &self,
        id: Uuid,
        update: &ApplicantUpdate,
    ) -> Result<Option<Applicant>, StoreError> {
        let updated: Option<Uuid> = match update {
            ApplicantUpdate::Personal(input) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE applicants SET
                        name = COALESCE($1, name),
                        cnic = COALESCE($2, cnic),
                        phone_number = COALESCE($3, phone_number),
                        email = COALESCE($4, email),
                        address = COALESCE($5, address),
                        city = COALESCE($6, city),
                        country = COALESCE($7, country),
                        qualification = COALESCE($8, qualification),
                        counselor = COALESCE($9, counselor),
                        visa_type = COALESCE($10, visa_type),
                        photo = COALESCE($11, photo),
                        branch_id = COALESCE($12, branch_id)
                    WHERE id = $13
                    RETURNING id
                    "#,
                )
                .bind(&input.name)
                .bind(&input.cnic)
                .bind(&input.phone_number)
                .bind(&input.email)
                .bind(&input.address)
                .bind(&input.city)
                .bind(&input.country)
                .bind(&input.qualification)
                .bind(&input.counselor)
                .bind(input.visa_type)
                .bind(&input.photo)
                .bind(input.branch_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            ApplicantUpdate::Education(details) => {
                sqlx::query_scalar(
                    "UPDATE applicants SET future_education = $1 WHERE id = $2 RETURNING id",
                )
                .bind(Json(details))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            ApplicantUpdate::Processing(input) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE applicants SET
                        status = COALESCE($1, status),
                        processing_notes = $2,
                        processing = $3
                    WHERE id = $4
                    RETURNING id
                    "#,
                )
                .bind(&input.status)
                .bind(Json(&input.processing_notes))
                .bind(Json(&input.processing))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            ApplicantUpdate::AddDocument(doc) => {
                sqlx::query_scalar(
                    "UPDATE applicants SET documents = documents || $1 WHERE id = $2 RETURNING id",
                )
                .bind(Json(vec![doc]))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match updated {
            Some(id) => self.get_applicant(id).await,
            None => Ok(None),
        }
    }

    async fn list_payments(&self, applicant_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE applicant_id = $1 ORDER BY seq",
            PAYMENT_COLUMNS
        ))
        .bind(applicant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn insert_payment(
        &self,
        applicant_id: Uuid,
        batch_id: Uuid,
        draft: &PaymentDraft,
    ) -> Result<Payment, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (applicant_id, batch_id, amount, purpose, currency, rate, refundable)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(applicant_id)
        .bind(batch_id)
        .bind(draft.amount)
        .bind(&draft.purpose)
        .bind(&draft.currency)
        .bind(draft.rate)
        .bind(draft.refundable)
        .fetch_one(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn delete_payment(&self, applicant_id: Uuid, payment_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1 AND applicant_id = $2")
            .bind(payment_id)
            .bind(applicant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_batch(&self, applicant_id: Uuid, batch_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM payments WHERE applicant_id = $1 AND batch_id = $2")
            .bind(applicant_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_agreement(&self, applicant_id: Uuid) -> Result<Option<Agreement>, StoreError> {
        let row = sqlx::query_as::<_, AgreementRow>(
            "SELECT amount, currency FROM agreements WHERE applicant_id = $1",
        )
        .bind(applicant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Agreement {
            amount: r.amount,
            currency: r.currency,
        }))
    }

    async fn put_agreement(
        &self,
        applicant_id: Uuid,
        agreement: &Agreement,
    ) -> Result<Agreement, StoreError> {
        let row = sqlx::query_as::<_, AgreementRow>(
            r#"
            INSERT INTO agreements (applicant_id, amount, currency)
            VALUES ($1, $2, $3)
            ON CONFLICT (applicant_id) DO UPDATE
                SET amount = EXCLUDED.amount, currency = EXCLUDED.currency
            RETURNING amount, currency
            "#,
        )
        .bind(applicant_id)
        .bind(agreement.amount)
        .bind(&agreement.currency)
        .fetch_one(&self.pool)
        .await?;
        Ok(Agreement {
            amount: row.amount,
            currency: row.currency,
        })
    }
}

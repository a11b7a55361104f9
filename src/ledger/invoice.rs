//! Invoice view-models
//!
//! Nothing here is persisted. Every view or print rebuilds the invoice from
//! the batch's payments and the applicant's current agreement.

use super::format::format_with_commas;
use super::words::{amount_in_words, AmountWordsMode};
use crate::models::{Agreement, Applicant, FutureEducationDetails, Payment, VisaType};
use crate::validation::{ValidationError, DEFAULT_AGREEMENT_CURRENCY};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Printed template, chosen by visa type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Student,
    Work,
    Visit,
}

impl From<VisaType> for InvoiceKind {
    fn from(visa: VisaType) -> Self {
        match visa {
            VisaType::StudentVisa => InvoiceKind::Student,
            VisaType::WorkPermit => InvoiceKind::Work,
            VisaType::VisitVisa => InvoiceKind::Visit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    /// 1-based row number ("Sr.")
    pub index: usize,
    pub payment_id: Uuid,
    pub purpose: String,
    pub amount: Decimal,
    pub currency: String,
    pub rate: Option<Decimal>,
    pub refundable: bool,
    pub remaining_amount: Decimal,
    pub amount_display: String,
    pub remaining_display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub grand_total: Decimal,
    pub non_refundable: Decimal,
    pub refundable: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencySubtotal {
    pub currency: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceComputation {
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
}

/// Running balance over a batch, seeded with the agreed amount.
///
/// Each line's `remaining_amount` is the agreed amount minus every payment
/// up to and including that line, in array order.
pub fn compute_invoice_lines(agreed_amount: Decimal, payments: &[Payment]) -> InvoiceComputation {
    let mut remaining = agreed_amount;
    let mut totals = InvoiceTotals::default();
    let mut lines = Vec::with_capacity(payments.len());

    for (i, payment) in payments.iter().enumerate() {
        remaining -= payment.amount;
        totals.grand_total += payment.amount;
        if payment.refundable {
            totals.refundable += payment.amount;
        } else {
            totals.non_refundable += payment.amount;
        }

        lines.push(InvoiceLine {
            index: i + 1,
            payment_id: payment.id,
            purpose: payment.purpose.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            rate: payment.rate,
            refundable: payment.refundable,
            remaining_amount: remaining,
            amount_display: format_with_commas(payment.amount),
            remaining_display: format_with_commas(remaining),
        });
    }

    InvoiceComputation { lines, totals }
}

/// Per-currency totals in order of first appearance
pub fn currency_subtotals(payments: &[Payment]) -> Vec<CurrencySubtotal> {
    let mut subtotals: Vec<CurrencySubtotal> = Vec::new();
    for payment in payments {
        match subtotals.iter_mut().find(|s| s.currency == payment.currency) {
            Some(existing) => existing.total += payment.amount,
            None => subtotals.push(CurrencySubtotal {
                currency: payment.currency.clone(),
                total: payment.amount,
            }),
        }
    }
    subtotals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceClient {
    pub name: String,
    pub cnic: String,
    pub contact: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    /// Invoices are numbered by their batch
    pub invoice_number: Uuid,
    pub kind: InvoiceKind,
    pub visa_type: VisaType,
    pub date: NaiveDate,
    pub client: InvoiceClient,
    pub future_education: Option<FutureEducationDetails>,
    pub agreed_amount: Decimal,
    pub agreed_currency: String,
    pub agreed_amount_display: String,
    pub agreed_amount_in_words: String,
    /// Display currency and rate come from the batch's first payment
    pub currency: String,
    pub rate: Option<Decimal>,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
    pub currency_subtotals: Vec<CurrencySubtotal>,
    pub total_display: String,
    pub total_in_words: String,
    pub comment: String,
}

pub struct InvoiceInput<'a> {
    pub applicant: &'a Applicant,
    pub batch_id: Uuid,
    pub payments: &'a [Payment],
    pub agreement: Option<&'a Agreement>,
    pub comment: &'a str,
    pub date: NaiveDate,
}

/// Assemble the printable invoice for one batch.
///
/// Returns `None` when the batch holds no payments.
pub fn build_invoice(
    input: InvoiceInput<'_>,
    words_mode: AmountWordsMode,
) -> Result<Option<Invoice>, ValidationError> {
    let Some(first) = input.payments.first() else {
        return Ok(None);
    };

    let (agreed_amount, agreed_currency) = match input.agreement {
        Some(a) => (a.amount, a.currency.clone()),
        None => (Decimal::ZERO, DEFAULT_AGREEMENT_CURRENCY.to_string()),
    };

    let computation = compute_invoice_lines(agreed_amount, input.payments);
    let applicant = input.applicant;

    let future_education = if applicant.visa_type.is_education_oriented() {
        applicant.future_education.clone()
    } else {
        None
    };

    Ok(Some(Invoice {
        invoice_number: input.batch_id,
        kind: InvoiceKind::from(applicant.visa_type),
        visa_type: applicant.visa_type,
        date: input.date,
        client: InvoiceClient {
            name: applicant.name.clone(),
            cnic: applicant.cnic.clone(),
            contact: applicant.phone_number.clone(),
            address: applicant.address.clone(),
        },
        future_education,
        agreed_amount,
        agreed_amount_display: format_with_commas(agreed_amount),
        agreed_amount_in_words: amount_in_words(agreed_amount, words_mode)?,
        agreed_currency,
        currency: first.currency.clone(),
        rate: first.rate,
        total_display: format_with_commas(computation.totals.grand_total),
        total_in_words: amount_in_words(computation.totals.grand_total, words_mode)?,
        currency_subtotals: currency_subtotals(input.payments),
        lines: computation.lines,
        totals: computation.totals,
        comment: input.comment.to_string(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ProcessingRecord;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    pub(crate) fn payment(batch_id: Uuid, amount: Decimal, refundable: bool, currency: &str) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            applicant_id: Uuid::nil(),
            batch_id,
            amount,
            purpose: "Consultancy fee".to_string(),
            currency: currency.to_string(),
            rate: None,
            refundable,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn applicant(visa_type: VisaType) -> Applicant {
        Applicant {
            id: Uuid::new_v4(),
            name: "Hamza Tariq".to_string(),
            cnic: "35202-7654321-3".to_string(),
            phone_number: "+92 321 7654321".to_string(),
            email: None,
            address: "12 Canal View, Lahore".to_string(),
            city: "Lahore".to_string(),
            country: "Pakistan".to_string(),
            qualification: "FSc".to_string(),
            counselor: "Bilal".to_string(),
            visa_type,
            photo: None,
            branch_id: None,
            status: "Pending".to_string(),
            processing_notes: Vec::new(),
            documents: Vec::new(),
            future_education: Some(FutureEducationDetails {
                country: "United Kingdom".to_string(),
                city: "Leeds".to_string(),
                institute: "University of Leeds".to_string(),
                course: "MSc Data Science".to_string(),
                intake: "September 2025".to_string(),
            }),
            agreement: None,
            processing: ProcessingRecord::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_running_balance_scenario() {
        let batch = Uuid::new_v4();
        let payments = vec![
            payment(batch, dec!(200), false, "USD"),
            payment(batch, dec!(300), true, "USD"),
        ];
        let result = compute_invoice_lines(dec!(1000), &payments);

        assert_eq!(result.lines[0].remaining_amount, dec!(800));
        assert_eq!(result.lines[1].remaining_amount, dec!(500));
        assert_eq!(result.lines[1].index, 2);
        assert_eq!(result.totals.grand_total, dec!(500));
        assert_eq!(result.totals.non_refundable, dec!(200));
        assert_eq!(result.totals.refundable, dec!(300));
    }

    #[test]
    fn test_subtotals_add_up_and_balance_telescopes() {
        let batch = Uuid::new_v4();
        let amounts = [dec!(150.25), dec!(99.75), dec!(1200), dec!(0.5), dec!(42)];
        let payments: Vec<Payment> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| payment(batch, *a, i % 2 == 0, "PKR"))
            .collect();

        for agreed in [dec!(0), dec!(1000), dec!(5000.5)] {
            let result = compute_invoice_lines(agreed, &payments);
            let sum: Decimal = amounts.iter().copied().sum();
            assert_eq!(result.totals.grand_total, sum);
            assert_eq!(
                result.totals.non_refundable + result.totals.refundable,
                result.totals.grand_total
            );
            let last = result.lines.last().unwrap();
            assert_eq!(last.remaining_amount, agreed - result.totals.grand_total);
        }
    }

    #[test]
    fn test_lines_carry_display_amounts() {
        let batch = Uuid::new_v4();
        let payments = vec![
            payment(batch, dec!(250000), false, "PKR"),
            payment(batch, dec!(1234.50), true, "PKR"),
        ];
        let result = compute_invoice_lines(dec!(1500000), &payments);
        assert_eq!(result.lines[0].amount_display, "250,000");
        assert_eq!(result.lines[0].remaining_display, "1,250,000");
        assert_eq!(result.lines[1].amount_display, "1,234.5");
        assert_eq!(result.lines[1].remaining_display, "1,248,765.5");
    }

    #[test]
    fn test_overpayment_goes_negative() {
        let batch = Uuid::new_v4();
        let payments = vec![payment(batch, dec!(700), false, "USD"), payment(batch, dec!(700), false, "USD")];
        let result = compute_invoice_lines(dec!(1000), &payments);
        assert_eq!(result.lines[1].remaining_amount, dec!(-400));
    }

    #[test]
    fn test_empty_batch_has_no_lines() {
        let result = compute_invoice_lines(dec!(1000), &[]);
        assert!(result.lines.is_empty());
        assert_eq!(result.totals, InvoiceTotals::default());
    }

    #[test]
    fn test_currency_subtotals_keep_first_appearance_order() {
        let batch = Uuid::new_v4();
        let payments = vec![
            payment(batch, dec!(100), false, "GBP"),
            payment(batch, dec!(5000), false, "PKR"),
            payment(batch, dec!(50), true, "GBP"),
        ];
        let subtotals = currency_subtotals(&payments);
        assert_eq!(subtotals.len(), 2);
        assert_eq!(subtotals[0].currency, "GBP");
        assert_eq!(subtotals[0].total, dec!(150));
        assert_eq!(subtotals[1].total, dec!(5000));
    }

    #[test]
    fn test_build_invoice() {
        let student = applicant(VisaType::StudentVisa);
        let batch = Uuid::new_v4();
        let mut first = payment(batch, dec!(200), false, "USD");
        first.rate = Some(dec!(278));
        let payments = vec![first, payment(batch, dec!(300), true, "USD")];
        let agreement = Agreement {
            amount: dec!(1000),
            currency: "USD".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();

        let invoice = build_invoice(
            InvoiceInput {
                applicant: &student,
                batch_id: batch,
                payments: &payments,
                agreement: Some(&agreement),
                comment: "First instalment",
                date,
            },
            AmountWordsMode::Truncate,
        )
        .unwrap()
        .unwrap();

        assert_eq!(invoice.invoice_number, batch);
        assert_eq!(invoice.kind, InvoiceKind::Student);
        assert_eq!(invoice.client.contact, "+92 321 7654321");
        assert_eq!(invoice.agreed_amount_display, "1,000");
        assert_eq!(invoice.agreed_amount_in_words, "One Thousand");
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.rate, Some(dec!(278)));
        assert_eq!(invoice.total_in_words, "Five Hundred");
        assert_eq!(invoice.total_display, "500");
        assert!(invoice.future_education.is_some());
        assert_eq!(invoice.comment, "First instalment");
    }

    #[test]
    fn test_build_invoice_without_agreement_or_payments() {
        let worker = applicant(VisaType::WorkPermit);
        let batch = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let empty = build_invoice(
            InvoiceInput {
                applicant: &worker,
                batch_id: batch,
                payments: &[],
                agreement: None,
                comment: "",
                date,
            },
            AmountWordsMode::Truncate,
        )
        .unwrap();
        assert!(empty.is_none());

        let payments = vec![payment(batch, dec!(250), false, "PKR")];
        let invoice = build_invoice(
            InvoiceInput {
                applicant: &worker,
                batch_id: batch,
                payments: &payments,
                agreement: None,
                comment: "",
                date,
            },
            AmountWordsMode::Truncate,
        )
        .unwrap()
        .unwrap();
        assert_eq!(invoice.kind, InvoiceKind::Work);
        assert_eq!(invoice.agreed_currency, "USD");
        assert_eq!(invoice.agreed_amount_in_words, "");
        assert_eq!(invoice.lines[0].remaining_amount, dec!(-250));
        assert!(invoice.future_education.is_none());
    }
}

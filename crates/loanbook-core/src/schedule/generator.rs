//! Flat-interest repayment schedule generation.
//!
//! Interest is charged once on the full principal for the stated term
//! (`principal * rate% * term_months / 12`), never on a declining balance.
//! The instalment count follows a fixed 30-day month: weekly loans pay
//! `ceil(term_months * 30 / 7)` instalments and daily loans
//! `term_months * 30`. Money is carried at full `Decimal` precision; the
//! only rounding that ever happens is the one requested through
//! [`RoundingPolicy`].

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::LoanBookError;
use crate::schedule::dates::due_date;
use crate::types::{with_metadata, ComputationOutput, EntryId, Frequency, LoanId, Money, Percent};
use crate::LoanBookResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed month length used to convert a term in months into days.
const DAYS_PER_MONTH: u32 = 30;
const DAYS_PER_WEEK: u32 = 7;
/// `100 (percent) * 12 (months per year)`.
const PERCENT_MONTHS_PER_YEAR: Decimal = dec!(1200);
/// Largest scale a `Decimal` can carry.
const MAX_DECIMAL_PLACES: u32 = 28;
/// Longest accepted term (50 years); bounds a daily schedule at 18 000 rows.
pub const MAX_TERM_MONTHS: u32 = 600;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

/// Immutable commercial terms of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual flat rate in percent (12 = 12% p.a.).
    pub interest_rate_pct: Percent,
    pub term_months: u32,
    pub frequency: Frequency,
    pub disbursement_date: NaiveDate,
}

/// How instalment amounts are rounded when the schedule is materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Every entry carries the full-precision instalment amount; the
    /// schedule total may drift from `total_payable` in the last digits.
    #[default]
    Exact,
    /// Entries are rounded to `decimal_places` and the final entry absorbs
    /// the remainder so the schedule sums to `total_payable` exactly.
    LastAbsorbsRemainder { decimal_places: u32 },
}

/// Knobs for schedule generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    #[serde(default)]
    pub rounding: RoundingPolicy,
}

/// One instalment row of a repayment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub loan_id: LoanId,
    /// 1-based, contiguous per loan.
    pub instalment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    #[serde(default)]
    pub amount_paid: Money,
    #[serde(default)]
    pub penalty: Money,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
}

impl ScheduleEntry {
    /// Fresh, unpaid entry.
    pub fn new(loan_id: &str, instalment_number: u32, due_date: NaiveDate, amount_due: Money) -> Self {
        ScheduleEntry {
            id: entry_id(loan_id, instalment_number),
            loan_id: loan_id.to_string(),
            instalment_number,
            due_date,
            amount_due,
            amount_paid: Decimal::ZERO,
            penalty: Decimal::ZERO,
            is_paid: false,
            paid_date: None,
        }
    }

    /// Amount still owed on the instalment itself, never negative.
    pub fn remaining(&self) -> Money {
        (self.amount_due - self.amount_paid).max(Decimal::ZERO)
    }

    /// Amount credited beyond `amount_due`.
    pub fn overpaid(&self) -> Money {
        (self.amount_paid - self.amount_due).max(Decimal::ZERO)
    }
}

/// Deterministic entry id: `<loan_id>-<instalment_number>`.
pub fn entry_id(loan_id: &str, instalment_number: u32) -> EntryId {
    format!("{loan_id}-{instalment_number}")
}

/// Input for [`generate_schedule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub loan_id: LoanId,
    #[serde(flatten)]
    pub terms: LoanTerms,
    #[serde(default)]
    pub options: ScheduleOptions,
}

/// Totals and rows produced for a loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub total_interest: Money,
    pub total_payable: Money,
    /// Pre-rounding `total_payable / num_instalments`.
    pub instalment_amount: Money,
    pub num_instalments: u32,
    /// `total_payable - sum(amount_due)`.
    pub rounding_drift: Money,
    pub entries: Vec<ScheduleEntry>,
}

/// Schedule figures without the rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePreview {
    pub total_interest: Money,
    pub total_payable: Money,
    pub instalment_amount: Money,
    pub num_instalments: u32,
    pub first_due_date: NaiveDate,
    pub last_due_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Flat interest over the whole term: `principal * rate% * term_months / 12`.
pub fn flat_interest(
    principal: Money,
    interest_rate_pct: Percent,
    term_months: u32,
) -> LoanBookResult<Money> {
    principal
        .checked_mul(interest_rate_pct)
        .and_then(|v| v.checked_mul(Decimal::from(term_months)))
        .and_then(|v| v.checked_div(PERCENT_MONTHS_PER_YEAR))
        .ok_or_else(|| LoanBookError::overflow("principal"))
}

/// Number of instalments for a term under the 30-day-month convention.
pub fn instalment_count(frequency: Frequency, term_months: u32) -> LoanBookResult<u32> {
    if term_months == 0 {
        return Err(LoanBookError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least 1 month".into(),
        });
    }
    let days = || {
        term_months
            .checked_mul(DAYS_PER_MONTH)
            .ok_or_else(|| LoanBookError::InvalidInput {
                field: "term_months".into(),
                reason: format!("Term of {term_months} months is too long"),
            })
    };

    Ok(match frequency {
        Frequency::Monthly => term_months,
        Frequency::Weekly => days()?.div_ceil(DAYS_PER_WEEK),
        Frequency::Daily => days()?,
    })
}

/// Compute totals and the first/last due dates without building the rows.
pub fn preview(terms: &LoanTerms) -> LoanBookResult<SchedulePreview> {
    validate_terms(terms)?;

    let num_instalments = instalment_count(terms.frequency, terms.term_months)?;
    let total_interest = flat_interest(terms.principal, terms.interest_rate_pct, terms.term_months)?;
    let total_payable = terms
        .principal
        .checked_add(total_interest)
        .ok_or_else(|| LoanBookError::overflow("principal"))?;
    let instalment_amount = total_payable / Decimal::from(num_instalments);

    Ok(SchedulePreview {
        total_interest,
        total_payable,
        instalment_amount,
        num_instalments,
        first_due_date: due_date(terms.disbursement_date, terms.frequency, 1)?,
        last_due_date: due_date(terms.disbursement_date, terms.frequency, num_instalments)?,
    })
}

/// Build the full repayment schedule for `loan_id`.
pub fn generate(
    loan_id: &str,
    terms: &LoanTerms,
    options: &ScheduleOptions,
) -> LoanBookResult<ScheduleOutput> {
    if loan_id.trim().is_empty() {
        return Err(LoanBookError::InvalidInput {
            field: "loan_id".into(),
            reason: "Loan id must not be empty".into(),
        });
    }
    let figures = preview(terms)?;
    let amounts = instalment_amounts(&figures, &options.rounding)?;

    let mut entries = Vec::with_capacity(amounts.len());
    for (idx, amount_due) in amounts.into_iter().enumerate() {
        let number = idx as u32 + 1;
        let due = due_date(terms.disbursement_date, terms.frequency, number)?;
        entries.push(ScheduleEntry::new(loan_id, number, due, amount_due));
    }

    let scheduled = entries
        .iter()
        .try_fold(Decimal::ZERO, |acc, e| acc.checked_add(e.amount_due))
        .ok_or_else(|| LoanBookError::overflow("principal"))?;
    let rounding_drift = figures.total_payable - scheduled;

    debug!(
        loan_id,
        num_instalments = figures.num_instalments,
        total_payable = %figures.total_payable,
        instalment_amount = %figures.instalment_amount,
        rounding_drift = %rounding_drift,
        "generated repayment schedule"
    );

    Ok(ScheduleOutput {
        total_interest: figures.total_interest,
        total_payable: figures.total_payable,
        instalment_amount: figures.instalment_amount,
        num_instalments: figures.num_instalments,
        rounding_drift,
        entries,
    })
}

/// Generate a schedule wrapped in the standard output envelope.
pub fn generate_schedule(
    input: &ScheduleInput,
) -> LoanBookResult<ComputationOutput<ScheduleOutput>> {
    let start = Instant::now();
    let output = generate(&input.loan_id, &input.terms, &input.options)?;
    let warnings = schedule_warnings(&input.terms);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Flat-interest instalment schedule (30-day month convention)",
        &serde_json::json!({
            "loan_id": input.loan_id,
            "principal": input.terms.principal.to_string(),
            "interest_rate_pct": input.terms.interest_rate_pct.to_string(),
            "term_months": input.terms.term_months,
            "frequency": input.terms.frequency,
            "disbursement_date": input.terms.disbursement_date,
            "rounding": input.options.rounding,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Preview a schedule wrapped in the standard output envelope.
pub fn preview_schedule(terms: &LoanTerms) -> LoanBookResult<ComputationOutput<SchedulePreview>> {
    let start = Instant::now();
    let output = preview(terms)?;
    let warnings = schedule_warnings(terms);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Flat-interest schedule preview (30-day month convention)",
        terms,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_terms(terms: &LoanTerms) -> LoanBookResult<()> {
    if terms.principal <= Decimal::ZERO {
        return Err(LoanBookError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if terms.interest_rate_pct < Decimal::ZERO {
        return Err(LoanBookError::InvalidInput {
            field: "interest_rate_pct".into(),
            reason: "Interest rate cannot be negative".into(),
        });
    }
    if terms.term_months == 0 {
        return Err(LoanBookError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least 1 month".into(),
        });
    }
    if terms.term_months > MAX_TERM_MONTHS {
        return Err(LoanBookError::InvalidInput {
            field: "term_months".into(),
            reason: format!("Term cannot exceed {MAX_TERM_MONTHS} months"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn instalment_amounts(
    figures: &SchedulePreview,
    rounding: &RoundingPolicy,
) -> LoanBookResult<Vec<Money>> {
    let n = figures.num_instalments as usize;

    match *rounding {
        RoundingPolicy::Exact => Ok(vec![figures.instalment_amount; n]),
        RoundingPolicy::LastAbsorbsRemainder { decimal_places } => {
            if decimal_places > MAX_DECIMAL_PLACES {
                return Err(LoanBookError::InvalidInput {
                    field: "rounding.decimal_places".into(),
                    reason: format!("At most {MAX_DECIMAL_PLACES} decimal places are supported"),
                });
            }
            let rounded = figures
                .instalment_amount
                .round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
            let last = rounded
                .checked_mul(Decimal::from(figures.num_instalments - 1))
                .and_then(|head| figures.total_payable.checked_sub(head))
                .ok_or_else(|| LoanBookError::overflow("principal"))?;

            if rounded <= Decimal::ZERO || last <= Decimal::ZERO {
                return Err(LoanBookError::InvalidInput {
                    field: "rounding.decimal_places".into(),
                    reason: format!(
                        "Instalment amount {} cannot be rounded to {} places without producing a non-positive instalment",
                        figures.instalment_amount, decimal_places
                    ),
                });
            }

            let mut amounts = vec![rounded; n];
            if let Some(tail) = amounts.last_mut() {
                *tail = last;
            }
            Ok(amounts)
        }
    }
}

fn schedule_warnings(terms: &LoanTerms) -> Vec<String> {
    let mut warnings = Vec::new();
    if terms.frequency == Frequency::Monthly && terms.disbursement_date.day() > 28 {
        warnings.push(format!(
            "Disbursement on day {}; due dates in shorter months fall on the last day of the month",
            terms.disbursement_date.day()
        ));
    }
    if terms.interest_rate_pct.is_zero() {
        warnings.push("Zero interest rate; total payable equals principal".into());
    }
    warnings
}

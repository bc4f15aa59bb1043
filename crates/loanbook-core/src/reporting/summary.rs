use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LoanBookError;
use crate::loan::{Loan, LoanStatus};
use crate::repayment::allocator::{select_target, Repayment};
use crate::repayment::overdue::{days_past_due, is_entry_overdue, oldest_overdue};
use crate::schedule::generator::ScheduleEntry;
use crate::types::{with_metadata, Clock, ComputationOutput, LoanId, Money};
use crate::LoanBookResult;

/// Balances and arrears of a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub as_of: NaiveDate,
    pub total_payable: Money,
    /// Sum of scheduled amounts due (differs from total_payable only by rounding drift).
    pub total_scheduled: Money,
    pub total_paid: Money,
    /// Sum of repayment facts for the loan; equals total_paid when facts and entries agree.
    pub total_repayments: Money,
    pub total_penalties: Money,
    /// Unpaid instalment amounts plus penalties. Overpayments are not netted.
    pub outstanding_balance: Money,
    pub overpaid: Money,
    pub instalments_total: usize,
    pub instalments_paid: usize,
    pub instalments_overdue: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due: Option<ScheduleEntry>,
    pub days_past_due: i64,
    pub is_overdue: bool,
}

/// Input for [`summarize_loan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryInput {
    pub loan: Loan,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub repayments: Vec<Repayment>,
}

pub fn loan_summary(
    loan: &Loan,
    schedule: &[ScheduleEntry],
    repayments: &[Repayment],
    as_of: NaiveDate,
) -> LoanBookResult<LoanSummary> {
    let entries: Vec<ScheduleEntry> = schedule
        .iter()
        .filter(|e| e.loan_id == loan.id)
        .cloned()
        .collect();

    if loan.status.has_schedule() && entries.is_empty() {
        return Err(LoanBookError::InvalidInput {
            field: "schedule".into(),
            reason: format!("Loan {} is {} but has no schedule entries", loan.id, loan.status),
        });
    }
    if !loan.status.has_schedule() && !entries.is_empty() {
        return Err(LoanBookError::InvalidInput {
            field: "schedule".into(),
            reason: format!("Loan {} is {} and must not have schedule entries", loan.id, loan.status),
        });
    }

    let total_scheduled: Money = entries.iter().map(|e| e.amount_due).sum();
    let total_paid: Money = entries.iter().map(|e| e.amount_paid).sum();
    let total_penalties: Money = entries.iter().map(|e| e.penalty).sum();
    let unpaid: Money = entries.iter().map(|e| e.remaining()).sum();
    let overpaid: Money = entries.iter().map(|e| e.overpaid()).sum();
    let total_repayments: Money = repayments
        .iter()
        .filter(|r| r.loan_id == loan.id)
        .map(|r| r.amount)
        .sum();

    let tracks_arrears = loan.status.is_open();
    let instalments_overdue = if tracks_arrears {
        entries.iter().filter(|e| is_entry_overdue(e, as_of)).count()
    } else {
        0
    };
    let days_past_due = if tracks_arrears {
        oldest_overdue(&entries, as_of)
            .map(|e| days_past_due(e, as_of))
            .unwrap_or(0)
    } else {
        0
    };

    Ok(LoanSummary {
        loan_id: loan.id.clone(),
        status: loan.status,
        as_of,
        total_payable: loan.total_payable,
        total_scheduled,
        total_paid,
        total_repayments,
        total_penalties,
        outstanding_balance: (unpaid + total_penalties).max(Decimal::ZERO),
        overpaid,
        instalments_total: entries.len(),
        instalments_paid: entries.iter().filter(|e| e.is_paid).count(),
        instalments_overdue,
        next_due: select_target(&loan.id, &entries).cloned(),
        days_past_due,
        is_overdue: instalments_overdue > 0,
    })
}

/// Loan summary wrapped in the standard output envelope.
pub fn summarize_loan(
    input: &SummaryInput,
    clock: &dyn Clock,
) -> LoanBookResult<ComputationOutput<LoanSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let as_of = clock.today();

    let summary = loan_summary(&input.loan, &input.schedule, &input.repayments, as_of)?;

    if summary.total_repayments != summary.total_paid {
        warnings.push(format!(
            "Repayment facts total {} but schedule entries record {} paid",
            summary.total_repayments, summary.total_paid
        ));
    }
    if summary.instalments_total > 0
        && summary.instalments_paid == summary.instalments_total
        && summary.status.is_open()
    {
        warnings.push("All instalments are paid; the loan can be moved to cleared".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan balance summary (per-instalment outstanding plus penalties)",
        &serde_json::json!({
            "loan_id": input.loan.id,
            "as_of": as_of,
            "entries": input.schedule.len(),
            "repayments": input.repayments.len(),
        }),
        warnings,
        elapsed,
        summary,
    ))
}

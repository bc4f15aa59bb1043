//! Portfolio aging: dashboard totals and days-past-due buckets.
//!
//! Every figure is a plain reduction over the snapshot, so the result does
//! not depend on the order of loans, entries or repayments.
//!
//! `total_disbursed` sums the principal of every loan in the snapshot,
//! including pending, rejected and cleared ones. This matches the existing
//! dashboard aggregation and is kept as-is.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::LoanBookError;
use crate::loan::{Borrower, Loan};
use crate::repayment::allocator::Repayment;
use crate::repayment::overdue::{days_past_due, is_entry_overdue};
use crate::schedule::generator::ScheduleEntry;
use crate::types::{with_metadata, Clock, ComputationOutput, Money};
use crate::LoanBookResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

/// Already-fetched state of the book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    #[serde(default)]
    pub borrowers: Vec<Borrower>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub repayments: Vec<Repayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingOptions {
    /// Upper bounds (inclusive, in days past due) of every bucket but the last.
    pub bucket_edges: Vec<i64>,
}

impl Default for AgingOptions {
    fn default() -> Self {
        AgingOptions {
            bucket_edges: vec![30, 60, 90],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingBucket {
    pub label: String,
    pub min_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_days: Option<i64>,
    pub instalments: usize,
    pub outstanding: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub total_borrowers: usize,
    /// Loans in `active` or `disbursed`.
    pub active_loans: usize,
    /// Principal over all loans regardless of status.
    pub total_disbursed: Money,
    pub total_collected: Money,
    /// Distinct open loans with at least one overdue instalment.
    pub overdue_loans: usize,
    pub overdue_amount: Money,
    pub buckets: Vec<AgingBucket>,
}

/// Input for [`compute_aging_report`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgingInput {
    #[serde(flatten)]
    pub snapshot: PortfolioSnapshot,
    #[serde(default)]
    pub options: AgingOptions,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn aging_report(
    snapshot: &PortfolioSnapshot,
    options: &AgingOptions,
    as_of: NaiveDate,
) -> LoanBookResult<AgingReport> {
    validate_options(options)?;

    let loans_by_id: HashMap<&str, &Loan> =
        snapshot.loans.iter().map(|l| (l.id.as_str(), l)).collect();

    let active_loans = snapshot.loans.iter().filter(|l| l.status.is_open()).count();
    let total_disbursed: Money = snapshot.loans.iter().map(|l| l.principal).sum();
    let total_collected: Money = snapshot.repayments.iter().map(|r| r.amount).sum();

    let mut buckets = empty_buckets(&options.bucket_edges);
    let mut overdue: BTreeSet<&str> = BTreeSet::new();
    let mut overdue_amount = Decimal::ZERO;

    for entry in &snapshot.schedule {
        let open = loans_by_id
            .get(entry.loan_id.as_str())
            .is_some_and(|l| l.status.is_open());
        if !open || !is_entry_overdue(entry, as_of) {
            continue;
        }
        overdue.insert(entry.loan_id.as_str());

        let outstanding = entry.remaining();
        overdue_amount += outstanding;
        let idx = bucket_index(&options.bucket_edges, days_past_due(entry, as_of));
        buckets[idx].instalments += 1;
        buckets[idx].outstanding += outstanding;
    }

    debug!(
        loans = snapshot.loans.len(),
        entries = snapshot.schedule.len(),
        overdue_loans = overdue.len(),
        "aging report computed"
    );

    Ok(AgingReport {
        as_of,
        total_borrowers: snapshot.borrowers.len(),
        active_loans,
        total_disbursed,
        total_collected,
        overdue_loans: overdue.len(),
        overdue_amount,
        buckets,
    })
}

/// Aging report wrapped in the standard output envelope.
pub fn compute_aging_report(
    input: &AgingInput,
    clock: &dyn Clock,
) -> LoanBookResult<ComputationOutput<AgingReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let as_of = clock.today();

    let report = aging_report(&input.snapshot, &input.options, as_of)?;

    let known: BTreeSet<&str> = input.snapshot.loans.iter().map(|l| l.id.as_str()).collect();
    if known.len() != input.snapshot.loans.len() {
        warnings.push("Snapshot contains duplicate loan ids; each id is counted once for overdue detection".into());
    }
    let orphans = input
        .snapshot
        .schedule
        .iter()
        .filter(|e| !known.contains(e.loan_id.as_str()))
        .count();
    if orphans > 0 {
        warnings.push(format!(
            "{orphans} schedule entries reference loans missing from the snapshot and were ignored"
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio aging (open loans, unpaid instalments past due date)",
        &serde_json::json!({
            "as_of": as_of,
            "bucket_edges": input.options.bucket_edges,
            "total_disbursed_scope": "all loans regardless of status",
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_options(options: &AgingOptions) -> LoanBookResult<()> {
    if options.bucket_edges.first().is_some_and(|&d| d < 1) {
        return Err(LoanBookError::InvalidInput {
            field: "bucket_edges".into(),
            reason: "Bucket edges must be at least 1 day".into(),
        });
    }
    if options.bucket_edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(LoanBookError::InvalidInput {
            field: "bucket_edges".into(),
            reason: "Bucket edges must be strictly increasing".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn empty_buckets(edges: &[i64]) -> Vec<AgingBucket> {
    let mut buckets = Vec::with_capacity(edges.len() + 1);
    let mut lower = 1;
    for &upper in edges {
        buckets.push(AgingBucket {
            label: format!("{lower}-{upper}"),
            min_days: lower,
            max_days: Some(upper),
            instalments: 0,
            outstanding: Decimal::ZERO,
        });
        lower = upper + 1;
    }
    buckets.push(AgingBucket {
        label: format!("{lower}+"),
        min_days: lower,
        max_days: None,
        instalments: 0,
        outstanding: Decimal::ZERO,
    });
    buckets
}

fn bucket_index(edges: &[i64], days: i64) -> usize {
    edges.iter().position(|&upper| days <= upper).unwrap_or(edges.len())
}

//! FIFO repayment allocation.
//!
//! A payment is credited in full to the unpaid entry with the lowest
//! instalment number. It is never split across instalments and any excess
//! stays on that entry. The allocation also reports the entry's state
//! before the payment so the store can apply the update as a
//! compare-and-swap instead of a blind overwrite.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::LoanBookError;
use crate::repayment::overdue::is_entry_overdue;
use crate::schedule::generator::ScheduleEntry;
use crate::types::{with_metadata, Clock, ComputationOutput, EntryId, LoanId, Money};
use crate::LoanBookResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

/// A payment as received from the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Id for the resulting repayment fact, issued by the store.
    pub repayment_id: String,
    pub loan_id: LoanId,
    pub amount: Money,
    /// Defaults to the clock's date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    /// Opaque principal from the identity provider.
    pub recorded_by: String,
}

/// Append-only record of a payment against one schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: String,
    pub loan_id: LoanId,
    pub schedule_entry_id: EntryId,
    pub amount: Money,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    pub recorded_by: String,
}

/// Entry state the allocation was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub entry_id: EntryId,
    pub amount_paid: Money,
    pub is_paid: bool,
}

impl EntrySnapshot {
    pub fn of(entry: &ScheduleEntry) -> Self {
        EntrySnapshot {
            entry_id: entry.id.clone(),
            amount_paid: entry.amount_paid,
            is_paid: entry.is_paid,
        }
    }

    /// Whether `entry` is still in the captured state.
    pub fn matches(&self, entry: &ScheduleEntry) -> bool {
        entry.id == self.entry_id && entry.amount_paid == self.amount_paid && entry.is_paid == self.is_paid
    }
}

/// Result of allocating one payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub repayment: Repayment,
    pub entry: ScheduleEntry,
    pub previous: EntrySnapshot,
    /// The payment moved the entry to paid.
    pub fully_paid: bool,
    /// Amount credited beyond the entry's amount due, retained on the entry.
    pub overpayment: Money,
}

/// Input for [`allocate_repayment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    #[serde(flatten)]
    pub payment: PaymentRequest,
    pub schedule: Vec<ScheduleEntry>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Oldest unpaid entry of `loan_id`, regardless of slice order.
pub fn select_target<'a>(loan_id: &str, schedule: &'a [ScheduleEntry]) -> Option<&'a ScheduleEntry> {
    schedule
        .iter()
        .filter(|e| e.loan_id == loan_id && !e.is_paid)
        .min_by_key(|e| e.instalment_number)
}

/// Credit `request` to the oldest unpaid entry of its loan.
pub fn apply(
    request: &PaymentRequest,
    schedule: &[ScheduleEntry],
    clock: &dyn Clock,
) -> LoanBookResult<Allocation> {
    validate_payment(request)?;

    let target = select_target(&request.loan_id, schedule).ok_or_else(|| {
        LoanBookError::NoOutstandingInstalment {
            loan_id: request.loan_id.clone(),
        }
    })?;
    let payment_date = request.payment_date.unwrap_or_else(|| clock.today());

    let previous = EntrySnapshot::of(target);
    let mut entry = target.clone();
    entry.amount_paid = entry
        .amount_paid
        .checked_add(request.amount)
        .ok_or_else(|| LoanBookError::overflow("amount"))?;
    entry.is_paid = entry.amount_paid >= entry.amount_due;
    let fully_paid = entry.is_paid;
    if fully_paid {
        entry.paid_date = Some(payment_date);
    }
    let overpayment = entry.overpaid();

    let repayment = Repayment {
        id: request.repayment_id.clone(),
        loan_id: request.loan_id.clone(),
        schedule_entry_id: entry.id.clone(),
        amount: request.amount,
        payment_date,
        notes: request.notes.clone(),
        recorded_by: request.recorded_by.clone(),
    };

    debug!(
        loan_id = %request.loan_id,
        instalment = entry.instalment_number,
        amount = %request.amount,
        amount_paid = %entry.amount_paid,
        fully_paid,
        "repayment allocated"
    );
    if overpayment > Decimal::ZERO {
        warn!(
            loan_id = %request.loan_id,
            instalment = entry.instalment_number,
            overpayment = %overpayment,
            "overpayment retained on instalment"
        );
    }

    Ok(Allocation {
        repayment,
        entry,
        previous,
        fully_paid,
        overpayment,
    })
}

/// Allocate a payment wrapped in the standard output envelope.
pub fn allocate_repayment(
    input: &AllocationInput,
    clock: &dyn Clock,
) -> LoanBookResult<ComputationOutput<Allocation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let allocation = apply(&input.payment, &input.schedule, clock)?;

    if allocation.overpayment > Decimal::ZERO {
        warnings.push(format!(
            "Overpayment of {} retained on instalment {}; it is not rolled forward",
            allocation.overpayment, allocation.entry.instalment_number
        ));
    }
    if is_entry_overdue(&allocation.entry, clock.today()) {
        warnings.push(format!(
            "Instalment {} remains overdue after this payment ({} outstanding)",
            allocation.entry.instalment_number,
            allocation.entry.remaining()
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "FIFO allocation to oldest unpaid instalment (no split, no rollover)",
        &serde_json::json!({
            "loan_id": input.payment.loan_id,
            "amount": input.payment.amount.to_string(),
            "payment_date": allocation.repayment.payment_date,
            "entries_considered": input.schedule.len(),
        }),
        warnings,
        elapsed,
        allocation,
    ))
}

/// Add a late penalty to an unpaid entry that is overdue on `as_of`.
///
/// Penalties are tracked separately and do not change `is_paid`.
pub fn assess_penalty(
    entry: &ScheduleEntry,
    amount: Money,
    as_of: NaiveDate,
) -> LoanBookResult<ScheduleEntry> {
    if amount <= Decimal::ZERO {
        return Err(LoanBookError::InvalidInput {
            field: "penalty".into(),
            reason: "Penalty must be positive".into(),
        });
    }
    if !is_entry_overdue(entry, as_of) {
        return Err(LoanBookError::InvalidInput {
            field: "entry".into(),
            reason: format!(
                "Instalment {} is not overdue on {as_of}; penalties apply to unpaid instalments past due",
                entry.instalment_number
            ),
        });
    }
    let mut updated = entry.clone();
    updated.penalty = updated
        .penalty
        .checked_add(amount)
        .ok_or_else(|| LoanBookError::overflow("penalty"))?;
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_payment(request: &PaymentRequest) -> LoanBookResult<()> {
    if request.amount <= Decimal::ZERO {
        return Err(LoanBookError::InvalidInput {
            field: "amount".into(),
            reason: "Payment amount must be positive".into(),
        });
    }
    if request.repayment_id.trim().is_empty() {
        return Err(LoanBookError::InvalidInput {
            field: "repayment_id".into(),
            reason: "Repayment id must not be empty".into(),
        });
    }
    if request.loan_id.trim().is_empty() {
        return Err(LoanBookError::InvalidInput {
            field: "loan_id".into(),
            reason: "Loan id must not be empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::generator::{generate, LoanTerms, ScheduleOptions};
    use crate::types::{FixedClock, Frequency};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Helper: 300 over 3 months at 0%, so each instalment is exactly 100.
    fn schedule() -> Vec<ScheduleEntry> {
        let terms = LoanTerms {
            principal: dec!(300),
            interest_rate_pct: Decimal::ZERO,
            term_months: 3,
            frequency: Frequency::Monthly,
            disbursement_date: date(2024, 1, 10),
        };
        generate("L1", &terms, &ScheduleOptions::default()).unwrap().entries
    }

    fn payment(amount: Decimal) -> PaymentRequest {
        PaymentRequest {
            repayment_id: "R1".into(),
            loan_id: "L1".into(),
            amount,
            payment_date: Some(date(2024, 2, 5)),
            notes: "cash".into(),
            recorded_by: "teller-1".into(),
        }
    }

    fn clock() -> FixedClock {
        FixedClock(date(2024, 2, 5))
    }

    #[test]
    fn test_exact_payment_marks_paid() {
        let a = apply(&payment(dec!(100)), &schedule(), &clock()).unwrap();
        assert_eq!(a.entry.instalment_number, 1);
        assert!(a.fully_paid);
        assert!(a.entry.is_paid);
        assert_eq!(a.entry.paid_date, Some(date(2024, 2, 5)));
        assert_eq!(a.overpayment, Decimal::ZERO);
        assert_eq!(a.repayment.schedule_entry_id, a.entry.id);
        assert_eq!(a.previous.amount_paid, Decimal::ZERO);
        assert!(!a.previous.is_paid);
    }

    #[test]
    fn test_payment_overflow_rejected() {
        let mut entries = schedule();
        entries[0].amount_paid = Decimal::MAX - dec!(1);
        match apply(&payment(dec!(10)), &entries, &clock()).unwrap_err() {
            LoanBookError::InvalidInput { field, .. } => assert_eq!(field, "amount"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_penalty_overflow_rejected() {
        let mut entry = schedule().remove(0);
        entry.penalty = Decimal::MAX;
        let err = assess_penalty(&entry, dec!(1), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, LoanBookError::InvalidInput { .. }));
    }

    #[test]
    fn test_partial_payment_leaves_unpaid() {
        let a = apply(&payment(dec!(40)), &schedule(), &clock()).unwrap();
        assert!(!a.fully_paid);
        assert!(!a.entry.is_paid);
        assert_eq!(a.entry.paid_date, None);
        assert_eq!(a.entry.amount_paid, dec!(40));
        assert_eq!(a.entry.remaining(), dec!(60));
    }

    #[test]
    fn test_second_partial_completes_same_entry() {
        let mut sched = schedule();
        let first = apply(&payment(dec!(40)), &sched, &clock()).unwrap();
        sched[0] = first.entry;

        let second = apply(&payment(dec!(60)), &sched, &clock()).unwrap();
        assert_eq!(second.entry.instalment_number, 1);
        assert!(second.fully_paid);
        assert_eq!(second.previous.amount_paid, dec!(40));
    }

    #[test]
    fn test_overpayment_is_not_rolled_forward() {
        let a = apply(&payment(dec!(250)), &schedule(), &clock()).unwrap();
        assert_eq!(a.entry.instalment_number, 1);
        assert_eq!(a.entry.amount_paid, dec!(250));
        assert_eq!(a.overpayment, dec!(150));
        assert!(a.fully_paid);
    }

    #[test]
    fn test_selects_lowest_unpaid_regardless_of_order() {
        let mut sched = schedule();
        sched[0].amount_paid = dec!(100);
        sched[0].is_paid = true;
        sched.reverse();
        let a = apply(&payment(dec!(10)), &sched, &clock()).unwrap();
        assert_eq!(a.entry.instalment_number, 2);
    }

    #[test]
    fn test_ignores_other_loans() {
        let mut sched = schedule();
        for e in sched.iter_mut() {
            e.loan_id = "L2".into();
        }
        let err = apply(&payment(dec!(10)), &sched, &clock()).unwrap_err();
        assert!(matches!(err, LoanBookError::NoOutstandingInstalment { .. }));
    }

    #[test]
    fn test_fully_paid_schedule_has_no_target() {
        let mut sched = schedule();
        for e in sched.iter_mut() {
            e.amount_paid = e.amount_due;
            e.is_paid = true;
        }
        match apply(&payment(dec!(10)), &sched, &clock()).unwrap_err() {
            LoanBookError::NoOutstandingInstalment { loan_id } => assert_eq!(loan_id, "L1"),
            other => panic!("Expected NoOutstandingInstalment, got {:?}", other),
        }
    }

    #[test]
    fn test_payment_date_defaults_to_clock() {
        let mut req = payment(dec!(100));
        req.payment_date = None;
        let a = apply(&req, &schedule(), &FixedClock(date(2024, 2, 9))).unwrap();
        assert_eq!(a.repayment.payment_date, date(2024, 2, 9));
        assert_eq!(a.entry.paid_date, Some(date(2024, 2, 9)));
    }

    #[test]
    fn test_validation_non_positive_amount() {
        for amount in [Decimal::ZERO, dec!(-1)] {
            match apply(&payment(amount), &schedule(), &clock()).unwrap_err() {
                LoanBookError::InvalidInput { field, .. } => assert_eq!(field, "amount"),
                other => panic!("Expected InvalidInput, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_snapshot_matches() {
        let sched = schedule();
        let a = apply(&payment(dec!(10)), &sched, &clock()).unwrap();
        assert!(a.previous.matches(&sched[0]));
        assert!(!a.previous.matches(&a.entry));
    }

    #[test]
    fn test_envelope_warns_on_overpayment_and_overdue() {
        let input = AllocationInput {
            payment: payment(dec!(150)),
            schedule: schedule(),
        };
        let out = allocate_repayment(&input, &clock()).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("Overpayment"));

        let input = AllocationInput {
            payment: payment(dec!(10)),
            schedule: schedule(),
        };
        let late = FixedClock(date(2024, 3, 1));
        let out = allocate_repayment(&input, &late).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("remains overdue")));
    }

    #[test]
    fn test_assess_penalty() {
        let sched = schedule();
        let penalised = assess_penalty(&sched[0], dec!(5), date(2024, 3, 1)).unwrap();
        assert_eq!(penalised.penalty, dec!(5));
        assert!(!penalised.is_paid);

        let err = assess_penalty(&sched[0], dec!(5), date(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, LoanBookError::InvalidInput { .. }));
        let err = assess_penalty(&sched[0], Decimal::ZERO, date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, LoanBookError::InvalidInput { .. }));
    }
}

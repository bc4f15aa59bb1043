//! Overdue predicates shared by allocation, summaries and aging.

use chrono::NaiveDate;

use crate::loan::Loan;
use crate::schedule::generator::ScheduleEntry;

/// Unpaid and past its due date. A partial payment does not clear it.
pub fn is_entry_overdue(entry: &ScheduleEntry, as_of: NaiveDate) -> bool {
    !entry.is_paid && entry.due_date < as_of
}

/// An open loan with at least one overdue entry.
pub fn is_loan_overdue(loan: &Loan, schedule: &[ScheduleEntry], as_of: NaiveDate) -> bool {
    loan.status.is_open()
        && schedule
            .iter()
            .any(|e| e.loan_id == loan.id && is_entry_overdue(e, as_of))
}

/// Whole days since the due date for an overdue entry, 0 otherwise.
pub fn days_past_due(entry: &ScheduleEntry, as_of: NaiveDate) -> i64 {
    if is_entry_overdue(entry, as_of) {
        (as_of - entry.due_date).num_days()
    } else {
        0
    }
}

/// Overdue entry with the lowest instalment number.
pub fn oldest_overdue(schedule: &[ScheduleEntry], as_of: NaiveDate) -> Option<&ScheduleEntry> {
    schedule
        .iter()
        .filter(|e| is_entry_overdue(e, as_of))
        .min_by_key(|e| e.instalment_number)
}

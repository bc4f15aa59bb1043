//! Store boundary and an in-memory reference ledger.
//!
//! [`LoanStore`] captures what the engine needs from persistence: loan and
//! schedule inserted as one unit, and a repayment appended together with a
//! conditional update of its target entry. [`InMemoryLedger`] implements
//! it with all validation done before any mutation, so a failed call
//! leaves the ledger untouched.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::LoanBookError;
use crate::loan::{Borrower, Loan, LoanOrigination, LoanStatus};
use crate::reporting::aging::PortfolioSnapshot;
use crate::repayment::allocator::{apply, Allocation, PaymentRequest, Repayment};
use crate::schedule::generator::ScheduleEntry;
use crate::types::{Clock, LoanId};
use crate::LoanBookResult;

pub trait LoanStore {
    fn load_loan(&self, loan_id: &str) -> LoanBookResult<Loan>;

    fn load_schedule(&self, loan_id: &str) -> LoanBookResult<Vec<ScheduleEntry>>;

    /// Persist a new loan that has no schedule yet.
    fn insert_application(&mut self, loan: Loan) -> LoanBookResult<()>;

    /// Persist a loan together with its full schedule, all or nothing.
    fn insert_origination(&mut self, origination: LoanOrigination) -> LoanBookResult<()>;

    /// Replace a stored loan's status, checked against the status machine.
    fn update_loan(&mut self, loan: Loan) -> LoanBookResult<()>;

    /// Append the repayment and swap in the updated entry, provided the
    /// entry still matches `allocation.previous`.
    fn commit_allocation(&mut self, allocation: &Allocation) -> LoanBookResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    borrowers: BTreeMap<String, Borrower>,
    loans: BTreeMap<LoanId, Loan>,
    schedules: BTreeMap<LoanId, Vec<ScheduleEntry>>,
    repayments: Vec<Repayment>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_borrower(&mut self, borrower: Borrower) -> LoanBookResult<()> {
        borrower.validate()?;
        if self.borrowers.contains_key(&borrower.id) {
            return Err(LoanBookError::InvalidInput {
                field: "id".into(),
                reason: format!("Borrower {} already exists", borrower.id),
            });
        }
        self.borrowers.insert(borrower.id.clone(), borrower);
        Ok(())
    }

    pub fn repayments(&self) -> &[Repayment] {
        &self.repayments
    }

    /// Copy of the whole book, for reporting.
    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            borrowers: self.borrowers.values().cloned().collect(),
            loans: self.loans.values().cloned().collect(),
            schedule: self.schedules.values().flatten().cloned().collect(),
            repayments: self.repayments.clone(),
        }
    }

    fn check_borrower(&self, loan: &Loan) -> LoanBookResult<()> {
        // Borrowers are optional in the ledger; only enforce when some are registered.
        if !self.borrowers.is_empty() && !self.borrowers.contains_key(&loan.borrower_id) {
            return Err(LoanBookError::NotFound {
                entity: "borrower".into(),
                id: loan.borrower_id.clone(),
            });
        }
        Ok(())
    }
}

impl LoanStore for InMemoryLedger {
    fn load_loan(&self, loan_id: &str) -> LoanBookResult<Loan> {
        self.loans
            .get(loan_id)
            .cloned()
            .ok_or_else(|| LoanBookError::NotFound {
                entity: "loan".into(),
                id: loan_id.to_string(),
            })
    }

    fn load_schedule(&self, loan_id: &str) -> LoanBookResult<Vec<ScheduleEntry>> {
        if !self.loans.contains_key(loan_id) {
            return Err(LoanBookError::NotFound {
                entity: "loan".into(),
                id: loan_id.to_string(),
            });
        }
        Ok(self.schedules.get(loan_id).cloned().unwrap_or_default())
    }

    fn insert_application(&mut self, loan: Loan) -> LoanBookResult<()> {
        if loan.status.has_schedule() {
            return Err(LoanBookError::InvalidInput {
                field: "status".into(),
                reason: format!("A {} loan must be inserted with its schedule", loan.status),
            });
        }
        if self.loans.contains_key(&loan.id) {
            return Err(LoanBookError::InvalidInput {
                field: "id".into(),
                reason: format!("Loan {} already exists", loan.id),
            });
        }
        self.check_borrower(&loan)?;
        self.loans.insert(loan.id.clone(), loan);
        Ok(())
    }

    fn insert_origination(&mut self, origination: LoanOrigination) -> LoanBookResult<()> {
        let LoanOrigination { loan, schedule } = origination;

        if !loan.status.has_schedule() || schedule.is_empty() {
            return Err(LoanBookError::InvalidInput {
                field: "schedule".into(),
                reason: format!("Loan {} is {} with {} entries", loan.id, loan.status, schedule.len()),
            });
        }
        for (idx, entry) in schedule.iter().enumerate() {
            if entry.loan_id != loan.id || entry.instalment_number != idx as u32 + 1 {
                return Err(LoanBookError::InvalidInput {
                    field: "schedule".into(),
                    reason: format!(
                        "Entry {} does not continue the 1..N sequence of loan {}",
                        entry.id, loan.id
                    ),
                });
            }
        }
        if self.schedules.contains_key(&loan.id) {
            return Err(LoanBookError::InvalidInput {
                field: "schedule".into(),
                reason: format!("Loan {} already has a schedule", loan.id),
            });
        }
        if let Some(existing) = self.loans.get(&loan.id) {
            if !existing.status.can_transition_to(loan.status) {
                return Err(LoanBookError::InvalidTransition {
                    from: existing.status.to_string(),
                    to: loan.status.to_string(),
                });
            }
        }
        self.check_borrower(&loan)?;

        debug!(loan_id = %loan.id, entries = schedule.len(), "origination stored");
        self.schedules.insert(loan.id.clone(), schedule);
        self.loans.insert(loan.id.clone(), loan);
        Ok(())
    }

    fn update_loan(&mut self, loan: Loan) -> LoanBookResult<()> {
        let existing = self.load_loan(&loan.id)?;
        if existing.status == loan.status {
            return Ok(());
        }
        if !existing.status.can_transition_to(loan.status)
            || existing.status.has_schedule() != loan.status.has_schedule()
        {
            return Err(LoanBookError::InvalidTransition {
                from: existing.status.to_string(),
                to: loan.status.to_string(),
            });
        }
        self.loans.insert(loan.id.clone(), loan);
        Ok(())
    }

    fn commit_allocation(&mut self, allocation: &Allocation) -> LoanBookResult<()> {
        let loan_id = &allocation.repayment.loan_id;
        if self.repayments.iter().any(|r| r.id == allocation.repayment.id) {
            return Err(LoanBookError::InvalidInput {
                field: "repayment_id".into(),
                reason: format!("Repayment {} already recorded", allocation.repayment.id),
            });
        }
        let schedule = self
            .schedules
            .get_mut(loan_id)
            .ok_or_else(|| LoanBookError::NotFound {
                entity: "schedule".into(),
                id: loan_id.clone(),
            })?;
        let slot = schedule
            .iter_mut()
            .find(|e| e.id == allocation.entry.id)
            .ok_or_else(|| LoanBookError::NotFound {
                entity: "schedule entry".into(),
                id: allocation.entry.id.clone(),
            })?;

        if !allocation.previous.matches(slot) {
            warn!(entry_id = %slot.id, "allocation lost compare-and-swap");
            return Err(LoanBookError::ConcurrentModification {
                entry_id: slot.id.clone(),
            });
        }

        *slot = allocation.entry.clone();
        self.repayments.push(allocation.repayment.clone());
        Ok(())
    }
}

/// Re-read, allocate and commit one payment, then clear the loan if that
/// paid its last instalment.
///
/// A [`LoanBookError::ConcurrentModification`] means another payment
/// committed first; calling again re-reads and reselects the target.
///
/// Once the allocation is committed the payment stands: a failure to move
/// the loan to `cleared` afterwards is logged and the allocation is still
/// returned. [`Loan::settle_if_cleared`] can be retried on its own.
pub fn record_payment(
    store: &mut dyn LoanStore,
    request: &PaymentRequest,
    clock: &dyn Clock,
) -> LoanBookResult<Allocation> {
    let loan = store.load_loan(&request.loan_id)?;
    if !loan.status.is_open() {
        return Err(LoanBookError::InvalidInput {
            field: "loan_id".into(),
            reason: format!("Loan {} is {} and does not accept payments", loan.id, loan.status),
        });
    }

    let schedule = store.load_schedule(&loan.id)?;
    let allocation = apply(request, &schedule, clock)?;
    store.commit_allocation(&allocation)?;

    if allocation.fully_paid {
        if let Err(e) = clear_if_settled(store, &loan) {
            warn!(loan_id = %loan.id, error = %e, "payment recorded but loan was not cleared");
        }
    }
    Ok(allocation)
}

fn clear_if_settled(store: &mut dyn LoanStore, loan: &Loan) -> LoanBookResult<()> {
    let schedule = store.load_schedule(&loan.id)?;
    let settled = loan.settle_if_cleared(&schedule)?;
    if settled.status == LoanStatus::Cleared {
        debug!(loan_id = %loan.id, "loan cleared");
        store.update_loan(settled)?;
    }
    Ok(())
}

//! Borrowers, loans and the loan status machine.
//!
//! A loan is created in `pending_approval` with its totals precomputed but
//! no schedule. Moving it into `disbursed`/`active` goes through
//! [`Loan::activate`], which generates the schedule and returns loan and
//! rows together as a [`LoanOrigination`] so the store can persist both in
//! one unit. All transitions are pure: they return a new `Loan` and leave
//! the receiver untouched.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LoanBookError;
use crate::schedule::generator::{self, LoanTerms, ScheduleEntry, ScheduleOptions};
use crate::types::{BorrowerId, Frequency, LoanId, Money, Percent};
use crate::LoanBookResult;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    PendingApproval,
    Approved,
    Rejected,
    Disbursed,
    Active,
    Cleared,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::PendingApproval => "pending_approval",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Active => "active",
            LoanStatus::Cleared => "cleared",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    /// Money is out and repayments are expected.
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Disbursed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Cleared | LoanStatus::Rejected | LoanStatus::Defaulted
        )
    }

    /// Whether a loan in this status owns schedule entries.
    pub fn has_schedule(&self) -> bool {
        matches!(
            self,
            LoanStatus::Disbursed | LoanStatus::Active | LoanStatus::Cleared | LoanStatus::Defaulted
        )
    }

    pub fn can_transition_to(&self, to: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, to),
            (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (PendingApproval, Disbursed)
                | (PendingApproval, Active)
                | (Approved, Disbursed)
                | (Approved, Active)
                | (Disbursed, Active)
                | (Disbursed, Cleared)
                | (Disbursed, Defaulted)
                | (Active, Cleared)
                | (Active, Defaulted)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Borrower
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub full_name: String,
    /// National id or passport number.
    pub id_number: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantor: Option<Guarantor>,
}

impl Borrower {
    pub fn validate(&self) -> LoanBookResult<()> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("id_number", &self.id_number),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                return Err(LoanBookError::InvalidInput {
                    field: field.into(),
                    reason: "Required borrower field is empty".into(),
                });
            }
        }
        if let Some(g) = &self.guarantor {
            if g.name.trim().is_empty() {
                return Err(LoanBookError::InvalidInput {
                    field: "guarantor.name".into(),
                    reason: "Guarantor name is empty".into(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub principal: Money,
    pub interest_rate_pct: Percent,
    pub term_months: u32,
    pub frequency: Frequency,
    pub disbursement_date: NaiveDate,
    pub total_interest: Money,
    /// principal + total_interest.
    pub total_payable: Money,
    /// total_payable / num_instalments, before any rounding.
    pub instalment_amount: Money,
    pub num_instalments: u32,
    pub status: LoanStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A loan entering repayment together with its full schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOrigination {
    pub loan: Loan,
    pub schedule: Vec<ScheduleEntry>,
}

impl Loan {
    /// New application in `pending_approval`, totals precomputed.
    pub fn new_application(
        id: &str,
        borrower_id: &str,
        terms: &LoanTerms,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> LoanBookResult<Loan> {
        if id.trim().is_empty() {
            return Err(LoanBookError::InvalidInput {
                field: "id".into(),
                reason: "Loan id must not be empty".into(),
            });
        }
        if borrower_id.trim().is_empty() {
            return Err(LoanBookError::InvalidInput {
                field: "borrower_id".into(),
                reason: "Borrower id must not be empty".into(),
            });
        }
        let figures = generator::preview(terms)?;

        Ok(Loan {
            id: id.to_string(),
            borrower_id: borrower_id.to_string(),
            principal: terms.principal,
            interest_rate_pct: terms.interest_rate_pct,
            term_months: terms.term_months,
            frequency: terms.frequency,
            disbursement_date: terms.disbursement_date,
            total_interest: figures.total_interest,
            total_payable: figures.total_payable,
            instalment_amount: figures.instalment_amount,
            num_instalments: figures.num_instalments,
            status: LoanStatus::PendingApproval,
            created_by: created_by.to_string(),
            created_at,
        })
    }

    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal: self.principal,
            interest_rate_pct: self.interest_rate_pct,
            term_months: self.term_months,
            frequency: self.frequency,
            disbursement_date: self.disbursement_date,
        }
    }

    pub fn approve(&self) -> LoanBookResult<Loan> {
        self.with_status(LoanStatus::Approved)
    }

    pub fn reject(&self) -> LoanBookResult<Loan> {
        self.with_status(LoanStatus::Rejected)
    }

    /// Disburse or activate the loan and generate its schedule.
    ///
    /// `to` must be `disbursed` or `active`; the loan must not own a
    /// schedule yet.
    pub fn activate(&self, to: LoanStatus, options: &ScheduleOptions) -> LoanBookResult<LoanOrigination> {
        if !matches!(to, LoanStatus::Disbursed | LoanStatus::Active) {
            return Err(LoanBookError::InvalidInput {
                field: "status".into(),
                reason: format!("Activation target must be disbursed or active, got {to}"),
            });
        }
        if self.status.has_schedule() {
            return Err(self.invalid_transition(to));
        }
        let mut loan = self.with_status(to)?;

        let output = generator::generate(&self.id, &self.terms(), options)?;
        // Stored figures are refreshed from the generator so loan and rows agree.
        loan.total_interest = output.total_interest;
        loan.total_payable = output.total_payable;
        loan.instalment_amount = output.instalment_amount;
        loan.num_instalments = output.num_instalments;

        debug!(
            loan_id = %loan.id,
            status = %loan.status,
            num_instalments = output.entries.len(),
            "loan activated"
        );

        Ok(LoanOrigination {
            loan,
            schedule: output.entries,
        })
    }

    /// `disbursed -> active`.
    pub fn mark_active(&self) -> LoanBookResult<Loan> {
        if self.status != LoanStatus::Disbursed {
            return Err(self.invalid_transition(LoanStatus::Active));
        }
        self.with_status(LoanStatus::Active)
    }

    /// Move an open loan to `cleared` when every instalment is paid;
    /// otherwise return it unchanged.
    pub fn settle_if_cleared(&self, schedule: &[ScheduleEntry]) -> LoanBookResult<Loan> {
        if !self.status.is_open() {
            return Err(self.invalid_transition(LoanStatus::Cleared));
        }
        let entries: Vec<&ScheduleEntry> =
            schedule.iter().filter(|e| e.loan_id == self.id).collect();
        if entries.is_empty() {
            return Err(LoanBookError::NotFound {
                entity: "schedule".into(),
                id: self.id.clone(),
            });
        }
        if entries.iter().all(|e| e.is_paid) {
            self.with_status(LoanStatus::Cleared)
        } else {
            Ok(self.clone())
        }
    }

    /// Record the external decision to default an open loan.
    pub fn mark_defaulted(&self) -> LoanBookResult<Loan> {
        self.with_status(LoanStatus::Defaulted)
    }

    fn with_status(&self, to: LoanStatus) -> LoanBookResult<Loan> {
        if !self.status.can_transition_to(to) {
            return Err(self.invalid_transition(to));
        }
        Ok(Loan {
            status: to,
            ..self.clone()
        })
    }

    fn invalid_transition(&self, to: LoanStatus) -> LoanBookError {
        LoanBookError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

pub mod error;
pub mod loan;
pub mod repayment;
pub mod reporting;
pub mod schedule;
pub mod types;

#[cfg(feature = "ledger")]
pub mod ledger;

pub use error::LoanBookError;
pub use types::*;

/// Standard result type for all loanbook operations
pub type LoanBookResult<T> = Result<T, LoanBookError>;

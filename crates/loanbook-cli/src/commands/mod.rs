pub mod repayment;
pub mod reporting;
pub mod schedule;

use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;

use loanbook_core::{Clock, FixedClock, SystemClock};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Clock for an optional `YYYY-MM-DD` evaluation date passed from JavaScript.
fn clock_for(as_of: Option<String>) -> NapiResult<Box<dyn Clock>> {
    match as_of {
        Some(s) => {
            let date = s.parse::<NaiveDate>().map_err(to_napi_error)?;
            Ok(Box::new(FixedClock(date)))
        }
        None => Ok(Box::new(SystemClock)),
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_schedule(input_json: String) -> NapiResult<String> {
    let input: loanbook_core::schedule::generator::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanbook_core::schedule::generator::generate_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn preview_schedule(terms_json: String) -> NapiResult<String> {
    let terms: loanbook_core::schedule::generator::LoanTerms =
        serde_json::from_str(&terms_json).map_err(to_napi_error)?;
    let output =
        loanbook_core::schedule::generator::preview_schedule(&terms).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Repayments
// ---------------------------------------------------------------------------

#[napi]
pub fn allocate_repayment(input_json: String, as_of: Option<String>) -> NapiResult<String> {
    let input: loanbook_core::repayment::allocator::AllocationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let clock = clock_for(as_of)?;
    let output = loanbook_core::repayment::allocator::allocate_repayment(&input, clock.as_ref())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[napi]
pub fn aging_report(snapshot_json: String, as_of: Option<String>) -> NapiResult<String> {
    let input: loanbook_core::reporting::aging::AgingInput =
        serde_json::from_str(&snapshot_json).map_err(to_napi_error)?;
    let clock = clock_for(as_of)?;
    let output = loanbook_core::reporting::aging::compute_aging_report(&input, clock.as_ref())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn loan_summary(input_json: String, as_of: Option<String>) -> NapiResult<String> {
    let input: loanbook_core::reporting::summary::SummaryInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let clock = clock_for(as_of)?;
    let output = loanbook_core::reporting::summary::summarize_loan(&input, clock.as_ref())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

//! Due-date arithmetic for instalment periods.
//!
//! Every due date is offset from the disbursement date, never chained from
//! the previous instalment. Monthly offsets clamp to the last day of the
//! target month (31 January + 1 month = 28/29 February); weekly and daily
//! offsets are exact day counts.

use chrono::{Days, Months, NaiveDate};

use crate::error::LoanBookError;
use crate::types::Frequency;
use crate::LoanBookResult;

/// Days per week for the weekly period.
const DAYS_PER_WEEK: u64 = 7;

/// Due date of the `period`-th instalment (1-based) after `start`.
pub fn due_date(start: NaiveDate, frequency: Frequency, period: u32) -> LoanBookResult<NaiveDate> {
    let due = match frequency {
        Frequency::Monthly => start.checked_add_months(Months::new(period)),
        Frequency::Weekly => start.checked_add_days(Days::new(DAYS_PER_WEEK * u64::from(period))),
        Frequency::Daily => start.checked_add_days(Days::new(u64::from(period))),
    };

    due.ok_or_else(|| {
        LoanBookError::DateError(format!(
            "Due date for {frequency} period {period} after {start} is out of range"
        ))
    })
}

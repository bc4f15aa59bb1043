use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanbook_core::repayment::allocator::{self, AllocationInput};
use loanbook_core::Clock;

use crate::input;

/// Arguments for repayment allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON input file: payment fields plus the loan's `schedule`
    #[arg(long)]
    pub input: Option<String>,

    /// Override the payment amount from the input
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Override who recorded the payment
    #[arg(long)]
    pub recorded_by: Option<String>,

    /// Payment notes
    #[arg(long)]
    pub notes: Option<String>,
}

pub fn run_allocate(args: AllocateArgs, clock: &dyn Clock) -> Result<Value, Box<dyn std::error::Error>> {
    let mut allocation_input: AllocationInput = input::read_input(args.input.as_deref())?
        .ok_or("allocation needs the schedule: provide --input or pipe JSON on stdin")?;

    if let Some(amount) = args.amount {
        allocation_input.payment.amount = amount;
    }
    if let Some(recorded_by) = args.recorded_by {
        allocation_input.payment.recorded_by = recorded_by;
    }
    if let Some(notes) = args.notes {
        allocation_input.payment.notes = notes;
    }

    let result = allocator::allocate_repayment(&allocation_input, clock)?;
    Ok(serde_json::to_value(result)?)
}

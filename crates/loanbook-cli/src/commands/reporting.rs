use clap::Args;
use serde_json::Value;

use loanbook_core::reporting::aging::{self, AgingInput};
use loanbook_core::reporting::summary::{self, SummaryInput};
use loanbook_core::Clock;

use crate::input;

/// Arguments for the portfolio aging report
#[derive(Args)]
pub struct AgingArgs {
    /// Path to JSON snapshot: borrowers, loans, schedule, repayments
    #[arg(long)]
    pub input: Option<String>,

    /// Days-past-due bucket edges, e.g. 30,60,90
    #[arg(long, value_delimiter = ',')]
    pub bucket_edges: Option<Vec<i64>>,
}

/// Arguments for a single-loan summary
#[derive(Args)]
pub struct SummaryArgs {
    /// Path to JSON input file: loan, schedule, repayments
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_aging(args: AgingArgs, clock: &dyn Clock) -> Result<Value, Box<dyn std::error::Error>> {
    let mut aging_input: AgingInput = input::read_input(args.input.as_deref())?
        .ok_or("aging needs a portfolio snapshot: provide --input or pipe JSON on stdin")?;

    if let Some(edges) = args.bucket_edges {
        aging_input.options.bucket_edges = edges;
    }

    let result = aging::compute_aging_report(&aging_input, clock)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_summary(args: SummaryArgs, clock: &dyn Clock) -> Result<Value, Box<dyn std::error::Error>> {
    let summary_input: SummaryInput = input::read_input(args.input.as_deref())?
        .ok_or("summary needs a loan and its schedule: provide --input or pipe JSON on stdin")?;

    let result = summary::summarize_loan(&summary_input, clock)?;
    Ok(serde_json::to_value(result)?)
}

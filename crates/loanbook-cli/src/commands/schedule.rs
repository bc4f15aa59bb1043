use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanbook_core::schedule::generator::{
    self, LoanTerms, RoundingPolicy, ScheduleInput, ScheduleOptions,
};
use loanbook_core::Frequency;

use crate::input;

/// Loan terms as individual flags
#[derive(Args)]
pub struct TermsArgs {
    /// Principal amount
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual flat interest rate in percent (12 = 12%)
    #[arg(long, alias = "interest-rate")]
    pub rate: Option<Decimal>,

    /// Loan term in months
    #[arg(long)]
    pub term_months: Option<u32>,

    /// Payment frequency: monthly, weekly or daily
    #[arg(long, default_value = "monthly")]
    pub frequency: Frequency,

    /// Disbursement date (YYYY-MM-DD)
    #[arg(long)]
    pub disbursement_date: Option<NaiveDate>,
}

impl TermsArgs {
    fn into_terms(self) -> Result<LoanTerms, Box<dyn std::error::Error>> {
        Ok(LoanTerms {
            principal: self
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            interest_rate_pct: self.rate.ok_or("--rate is required (or provide --input)")?,
            term_months: self
                .term_months
                .ok_or("--term-months is required (or provide --input)")?,
            frequency: self.frequency,
            disbursement_date: self
                .disbursement_date
                .ok_or("--disbursement-date is required (or provide --input)")?,
        })
    }
}

/// Arguments for schedule generation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan id used to key the schedule rows
    #[arg(long, default_value = "loan")]
    pub loan_id: String,

    /// Round instalments to this many decimal places; the last instalment absorbs the remainder
    #[arg(long)]
    pub round_to: Option<u32>,

    #[command(flatten)]
    pub terms: TermsArgs,
}

/// Arguments for schedule preview
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PreviewArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub terms: TermsArgs,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ScheduleInput {
            loan_id: args.loan_id,
            terms: args.terms.into_terms()?,
            options: ScheduleOptions {
                rounding: match args.round_to {
                    Some(decimal_places) => RoundingPolicy::LastAbsorbsRemainder { decimal_places },
                    None => RoundingPolicy::Exact,
                },
            },
        },
    };

    let result = generator::generate_schedule(&schedule_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_preview(args: PreviewArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => args.terms.into_terms()?,
    };

    let result = generator::preview_schedule(&terms)?;
    Ok(serde_json::to_value(result)?)
}

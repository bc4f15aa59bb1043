mod commands;
mod input;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::repayment::AllocateArgs;
use commands::reporting::{AgingArgs, SummaryArgs};
use commands::schedule::{PreviewArgs, ScheduleArgs};
use loanbook_core::{Clock, FixedClock, SystemClock};

/// Loan schedules, repayment allocation and portfolio aging
#[derive(Parser)]
#[command(
    name = "loanbook",
    version,
    about = "Loan schedules, repayment allocation and portfolio aging",
    long_about = "A CLI over the loanbook engine: generate flat-interest repayment \
                  schedules, allocate payments to the oldest unpaid instalment, and \
                  compute loan summaries and portfolio aging with decimal precision. \
                  Inputs are JSON files, JSON on stdin, or individual flags."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Evaluation date (YYYY-MM-DD) for overdue checks and default payment dates; defaults to today (UTC)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the full repayment schedule for a loan
    Schedule(ScheduleArgs),
    /// Preview totals and instalment count without building the rows
    Preview(PreviewArgs),
    /// Allocate a payment to the oldest unpaid instalment
    Allocate(AllocateArgs),
    /// Portfolio dashboard totals and days-past-due buckets
    Aging(AgingArgs),
    /// Balances and arrears of a single loan
    Summary(SummaryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Log to stderr, filtered by LOANBOOK_LOG (default "warn").
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOANBOOK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let clock: Box<dyn Clock> = match cli.as_of {
        Some(date) => Box::new(FixedClock(date)),
        None => Box::new(SystemClock),
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Preview(args) => commands::schedule::run_preview(args),
        Commands::Allocate(args) => commands::repayment::run_allocate(args, clock.as_ref()),
        Commands::Aging(args) => commands::reporting::run_aging(args, clock.as_ref()),
        Commands::Summary(args) => commands::reporting::run_summary(args, clock.as_ref()),
        Commands::Version => {
            println!("loanbook {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, ValueEnum};
use credit_ledger_rs::export::{write_balances, write_ledger, write_leaderboard};
use credit_ledger_rs::{BlockStore, CreditService, JsonLinesStore, RandomReward};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Credit Ledger - Replay credit events into a hash-chained ledger
///
/// Reads events from a CSV file, applies them to the ledger and writes the
/// requested report to stdout. The chain is audited before exit.
#[derive(Parser, Debug)]
#[command(name = "credit-ledger")]
#[command(about = "Records credit grants and redemptions in a tamper-evident ledger", long_about = None)]
struct Args {
    /// Path to CSV file with events
    ///
    /// Expected format: action,account,amount,label
    /// Example: cargo run -- events.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Report written to stdout
    #[arg(long, value_enum, default_value_t = Report::Ledger)]
    report: Report,

    /// Append blocks to this JSON-lines journal, resuming the chain it holds
    #[arg(long, value_name = "PATH")]
    journal: Option<PathBuf>,

    /// Smallest reward drawn for `earn` events
    #[arg(long, default_value_t = RandomReward::DEFAULT_MIN)]
    min_reward: i64,

    /// Largest reward drawn for `earn` events
    #[arg(long, default_value_t = RandomReward::DEFAULT_MAX)]
    max_reward: i64,

    /// Seed for reproducible reward draws
    #[arg(long)]
    seed: Option<u64>,

    /// Log every appended block
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    /// Every block, in chain order
    Ledger,
    /// Accounts ranked by balance
    Leaderboard,
    /// Every account with its balance
    Balances,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let range = args.min_reward..=args.max_reward;
    let policy = match args.seed {
        Some(seed) => RandomReward::seeded(range, seed),
        None => RandomReward::new(range),
    };
    let Some(policy) = policy else {
        error!(
            min = args.min_reward,
            max = args.max_reward,
            "reward range must be non-empty and positive"
        );
        process::exit(1);
    };

    let code = match &args.journal {
        Some(path) => {
            let service = JsonLinesStore::open(path).and_then(CreditService::open);
            match service {
                Ok(service) => run(&service.with_policy(policy), &args),
                Err(e) => {
                    error!("Error opening journal '{}': {}", path.display(), e);
                    1
                }
            }
        }
        None => run(&CreditService::new().with_policy(policy), &args),
    };
    process::exit(code);
}

/// Processes the input file and writes the report. Returns the exit code.
fn run<S: BlockStore>(service: &CreditService<S>, args: &Args) -> i32 {
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            return 1;
        }
    };

    if let Err(e) = process_events(service, BufReader::new(file)) {
        error!("Error processing events: {}", e);
        return 1;
    }

    if let Err(e) = write_report(service, args.report, std::io::stdout()) {
        error!("Error writing output: {}", e);
        return 1;
    }

    match service.verify_chain() {
        Ok(()) => {
            info!(blocks = service.ledger().len(), "chain verified");
            0
        }
        Err(violation) => {
            error!("{}", violation);
            2
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `action, account, amount, label`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    action: String,
    account: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<i64>,
    #[serde(default)]
    label: Option<String>,
}

/// Service call described by one CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open { account: String },
    Seed { account: String, amount: i64 },
    Grant { account: String, amount: i64 },
    Earn { account: String, label: String },
    Redeem { account: String, cost: i64, label: String },
}

impl CsvRecord {
    /// Converts a CSV record to an event.
    ///
    /// Returns `None` for unknown actions or missing required fields.
    fn into_event(self) -> Option<Event> {
        let account = self.account;
        let label = self.label.filter(|l| !l.is_empty());

        match self.action.to_lowercase().as_str() {
            "open" => Some(Event::Open { account }),
            "seed" => Some(Event::Seed {
                account,
                amount: self.amount?,
            }),
            "grant" => Some(Event::Grant {
                account,
                amount: self.amount?,
            }),
            "earn" => Some(Event::Earn {
                account,
                label: label?,
            }),
            "redeem" => Some(Event::Redeem {
                account,
                cost: self.amount?,
                label: label?,
            }),
            _ => None,
        }
    }
}

/// Counts of what happened to the input rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub applied: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Applies events from a CSV reader to the service.
///
/// Rows are streamed, so arbitrarily large files are fine. Malformed rows are
/// skipped and rejected operations leave no trace in the ledger; both are
/// logged and processing continues.
///
/// # CSV Format
///
/// Expected columns: `action, account, amount, label`
/// - `action`: open, seed, grant, earn, redeem
/// - `account`: Account holder id
/// - `amount`: Credits (required for seed, grant and redeem)
/// - `label`: Event for earn, reward for redeem
///
/// # Example
///
/// ```csv
/// action,account,amount,label
/// grant,H1,3,
/// earn,H2,,segregation verified
/// redeem,H1,2,reusable bag
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
pub fn process_events<R: Read, S: BlockStore>(
    service: &CreditService<S>,
    reader: R,
) -> Result<ProcessSummary, csv::Error> {
    let mut summary = ProcessSummary::default();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed row: {}", e);
                summary.skipped += 1;
                continue;
            }
        };
        let Some(event) = record.into_event() else {
            warn!("Skipping invalid event record");
            summary.skipped += 1;
            continue;
        };

        let outcome = match &event {
            Event::Open { account } => service.ensure_account(account.as_str()),
            Event::Seed { account, amount } => service.seed(account.as_str(), *amount).map(drop),
            Event::Grant { account, amount } => service.grant(account.as_str(), *amount).map(drop),
            Event::Earn { account, label } => service.reward(account.as_str(), label).map(drop),
            Event::Redeem {
                account,
                cost,
                label,
            } => service.redeem(account.as_str(), *cost, label).map(drop),
        };

        match outcome {
            Ok(()) => summary.applied += 1,
            Err(e) if e.is_business_rejection() => {
                debug!("Rejected {:?}: {}", event, e);
                summary.rejected += 1;
            }
            Err(e) => {
                warn!("Rejected {:?}: {}", event, e);
                summary.rejected += 1;
            }
        }
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        skipped = summary.skipped,
        "events processed"
    );
    Ok(summary)
}

/// Writes the selected report as CSV.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_report<S: BlockStore, W: Write>(
    service: &CreditService<S>,
    report: Report,
    writer: W,
) -> Result<(), csv::Error> {
    match report {
        Report::Ledger => write_ledger(&service.export_ledger(), writer),
        Report::Leaderboard => write_leaderboard(&service.leaderboard(), writer),
        Report::Balances => write_balances(service, writer),
    }
}

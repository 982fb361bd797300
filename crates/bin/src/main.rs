//! ncsr CLI binary.
//!
//! Searches for fund shareholder reports, extracts per-share-class expense
//! and performance disclosures and exports them as CSV.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ncsr::{
    API_KEY_VAR, ClassIdPolicy, FormType, PerformanceChart, Pipeline, PipelineConfig,
    RESULT_LIMIT_OPTIONS, ReportKind, RunOutcome, RunRequest, SecApiClient, SecApiConfig,
};
use tracing_subscriber::EnvFilter;

/// Width of the longest chart bar.
const CHART_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "ncsr")]
#[command(about = "Extract expense and performance disclosures from N-CSR filings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract expense disclosures per share class
    Expenses(RunArgs),

    /// Check which share classes disclose average annual returns
    Performance(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Form type to search for (repeatable; defaults to N-CSR and N-CSRS)
    #[arg(long = "form", value_name = "FORM")]
    forms: Vec<String>,

    /// First filing date (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,

    /// Last filing date (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,

    /// Maximum number of filings (5, 20, 50, 100 or 200)
    #[arg(long, default_value = "5")]
    limit: usize,

    /// Class/series reference table
    #[arg(long, default_value = "class_series_mapping.csv")]
    mapping: PathBuf,

    /// CSV output path (defaults to a per-report file name)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Drop facts without a share class id
    #[arg(long)]
    strict: bool,

    /// Filings extracted concurrently
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// sec-api.io API key
    #[arg(long, env = "SEC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Expenses(args) => extract(ReportKind::Expenses, args).await,
        Commands::Performance(args) => extract(ReportKind::Performance, args).await,
    }
}

async fn extract(kind: ReportKind, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !RESULT_LIMIT_OPTIONS.contains(&args.limit) {
        return Err(format!(
            "--limit must be one of {:?}, got {}",
            RESULT_LIMIT_OPTIONS, args.limit
        )
        .into());
    }

    let form_types = if args.forms.is_empty() {
        FormType::shareholder_reports()
    } else {
        args.forms
            .iter()
            .map(FormType::new)
            .collect::<Result<Vec<_>, _>>()?
    };

    let request = RunRequest::new(
        form_types,
        args.from,
        args.to,
        args.limit,
        args.mapping,
        kind,
    );
    request.validate()?;

    let api_key = args.api_key;
    let config = SecApiConfig::from_lookup(|name| {
        if name == API_KEY_VAR {
            api_key.clone()
        } else {
            std::env::var(name).ok()
        }
    })?;
    let client = Arc::new(SecApiClient::new(config)?);

    let policy = if args.strict {
        ClassIdPolicy::Strict
    } else {
        ClassIdPolicy::Lenient
    };
    let pipeline = Pipeline::new(
        client.clone(),
        client,
        PipelineConfig::default()
            .with_concurrency(args.concurrency)
            .with_class_id_policy(policy),
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Searching filings...");

    let outcome = pipeline
        .run(&request, |done, total| {
            if done == 1 {
                pb.set_length(total as u64);
                pb.set_message("Extracting disclosures...");
            }
            pb.set_position(done as u64);
        })
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };

    let (report, filings, batch) = match outcome {
        RunOutcome::NoFilings => {
            pb.finish_and_clear();
            println!("No filings retrieved from SEC.");
            return Ok(());
        }
        RunOutcome::NoRows { filings, batch } => {
            pb.finish_and_clear();
            for failure in &batch.failures {
                eprintln!(
                    "Warning: Failed to extract {}: {}",
                    failure.filing_url, failure.error
                );
            }
            println!(
                "No valid data extracted from {} filings ({} without disclosures, {} failed).",
                filings.len(),
                batch.no_disclosure,
                batch.failures.len()
            );
            return Ok(());
        }
        RunOutcome::Report {
            report,
            filings,
            batch,
        } => (report, filings, batch),
    };

    pb.finish_with_message(format!("Processed {} filings", filings.len()));
    for failure in &batch.failures {
        eprintln!(
            "Warning: Failed to extract {}: {}",
            failure.filing_url, failure.error
        );
    }

    println!();
    match kind {
        ReportKind::Expenses => {
            println!("Successfully processed {} records!", report.len());
        }
        ReportKind::Performance => {
            println!(
                "{} out of {} share classes disclose performance information.",
                report.performance_count(),
                report.len()
            );
        }
    }
    println!(
        "  Filings: {} extracted, {} without disclosures, {} failed",
        batch.extracted,
        batch.no_disclosure,
        batch.failures.len()
    );
    println!();
    println!("{}", report.to_dataframe()?);

    if kind == ReportKind::Performance {
        println!();
        match PerformanceChart::from_report(&report) {
            Some(chart) => print!("{}", chart.render(CHART_WIDTH)),
            None => println!("'Entity Name' column not found in mapping file."),
        }
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(kind.default_file_name()));
    report.save_csv(&output)?;
    println!();
    println!("Wrote {}", output.display());

    Ok(())
}

mod echo;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use chumon_core::workbook::{CellValue, HEADERS, row_values};
use chumon_core::{
    AppConfig, BatchConfig, BatchReport, BatchRunner, ChumonError, DEFAULT_SHEET, FailurePolicy, FetchConfig, Fetcher,
    PageSource, ProductQuery, ProductRecord, SavedPage, TaxRate, WorkbookWriter, WriteMode, WriteSummary, load_config,
    parse_line, read_queries,
};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between attempts to write a locked workbook
const WRITE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Format of the record listing printed to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "tsv" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

/// Scrape product pages into an order workbook
#[derive(Parser, Debug)]
#[command(name = "chumon")]
#[command(version)]
#[command(about = "Scrape product pages into an order workbook", long_about = None)]
struct Args {
    /// Product URL with optional quantity, e.g. "https://www.monotaro.com/p/1234/5678/ 3"
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,

    /// File with one query per line, or "-" for stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<String>,

    /// Workbook to write (required unless --dry-run)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Add rows to an existing workbook instead of replacing it
    #[arg(long)]
    append: bool,

    /// Sheet to write to
    #[arg(long, value_name = "NAME")]
    sheet: Option<String>,

    /// What to do when a query fails (fail-fast, collect-all)
    #[arg(long, value_name = "POLICY")]
    policy: Option<FailurePolicy>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Attempts per page, including the first
    #[arg(long, value_name = "NUM", value_parser = clap::value_parser!(u32).range(1..))]
    retries: Option<u32>,

    /// Consumption tax rate as a fraction, e.g. 0.10
    #[arg(long, value_name = "RATE")]
    tax_rate: Option<f64>,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Settings file (default: ~/.config/chumon/config.txt)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not pause between requests to the same shop
    #[arg(long)]
    no_delay: bool,

    /// Serve this saved HTML page for every query instead of fetching
    #[arg(long, value_name = "FILE")]
    page: Option<String>,

    /// Print records without writing a workbook
    #[arg(long)]
    dry_run: bool,

    /// Record listing format (text, json)
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    format: OutputFormat,

    /// Attempts to write a locked workbook, 3 seconds apart
    #[arg(long, default_value = "1", value_name = "NUM", value_parser = clap::value_parser!(u32).range(1..))]
    write_attempts: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completion script
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "chumon=debug,chumon_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Queries from the command line first, then from `--input`.
fn collect_queries(args: &Args) -> anyhow::Result<Vec<ProductQuery>> {
    let mut queries = Vec::new();
    for raw in &args.queries {
        if let Some(query) = parse_line(raw).with_context(|| format!("Invalid query: {}", raw))? {
            queries.push(query);
        }
    }

    if let Some(input) = &args.input {
        let listed = if input == "-" {
            read_queries(io::stdin().lock())
        } else {
            let file = File::open(input).with_context(|| format!("Failed to open query list: {}", input))?;
            read_queries(BufReader::new(file))
        };
        queries.extend(listed.with_context(|| format!("Invalid query list: {}", input))?);
    }

    Ok(queries)
}

fn fetch_config(args: &Args, settings: &AppConfig) -> FetchConfig {
    let mut config = settings.fetch_config();
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(attempts) = args.retries {
        config.max_attempts = attempts;
    }
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = user_agent.clone();
    }
    config
}

fn batch_config(args: &Args, settings: &AppConfig) -> anyhow::Result<BatchConfig> {
    let mut config = settings.batch_config();
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(rate) = args.tax_rate {
        config.tax_rate = TaxRate::from_fraction(rate).context("Invalid --tax-rate")?;
    }
    if args.no_delay || args.page.is_some() {
        config.polite_delay = Some(Duration::ZERO);
    }
    Ok(config)
}

async fn run_batch<S: PageSource>(source: S, config: BatchConfig, queries: &[ProductQuery]) -> BatchReport {
    tracing::debug!(queries = queries.len(), policy = %config.policy, tax_rate = %config.tax_rate, "starting batch");
    let runner = BatchRunner::new(source, config);
    let total = queries.len();
    let report = runner.run(queries, |event| echo::print_event(&event, total)).await;
    tracing::info!(
        accepted = report.accepted_count(),
        skipped = report.skipped,
        aborted = report.aborted,
        cancelled = report.cancelled,
        "batch finished"
    );
    report
}

fn print_records(records: &[ProductRecord], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", HEADERS.join("\t"));
            for record in records {
                let cells: Vec<String> = row_values(record)
                    .into_iter()
                    .map(|cell| match cell {
                        CellValue::Text(text) => text,
                        CellValue::Number(n) => n.to_string(),
                    })
                    .collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
    Ok(())
}

/// Writes `records`, waiting and trying again while the file is locked.
async fn write_with_retries(
    writer: &WorkbookWriter, records: &[ProductRecord], attempts: u32,
) -> anyhow::Result<WriteSummary> {
    let mut attempt = 1;
    loop {
        match writer.write(records) {
            Ok(summary) => {
                tracing::debug!(path = %writer.path().display(), rows = summary.rows_written, "workbook written");
                return Ok(summary);
            }
            Err(ChumonError::WorkbookLocked(path)) if attempt < attempts => {
                tracing::warn!(path = %path.display(), attempt, attempts, "workbook locked, retrying");
                echo::print_warning(&format!(
                    "{} is open in another program ({}/{}), retrying in {}s",
                    path.display(),
                    attempt,
                    attempts,
                    WRITE_RETRY_DELAY.as_secs()
                ));
                tokio::time::sleep(WRITE_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to write workbook: {}", writer.path().display()));
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "chumon", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let settings = load_config(args.config.as_deref()).context("Failed to load settings")?;
    let fetch_config = fetch_config(&args, &settings);
    let mut batch_config = batch_config(&args, &settings)?;

    let queries = collect_queries(&args)?;
    if queries.is_empty() {
        bail!("No queries given. Pass product URLs as arguments or use --input");
    }

    let writer = match (&args.output, args.dry_run) {
        (_, true) => None,
        (Some(path), false) => {
            let sheet = args.sheet.as_deref().or(settings.sheet.as_deref()).unwrap_or(DEFAULT_SHEET);
            let mode = if args.append { WriteMode::Append } else { WriteMode::New };
            Some(WorkbookWriter::new(path, sheet, mode).context("Invalid workbook target")?)
        }
        (None, false) => bail!("--output is required unless --dry-run is given"),
    };

    if args.verbose {
        eprintln!("  {} {}", "Queries:".dimmed(), queries.len().to_string().bright_white());
        eprintln!("  {} {}", "Policy:".dimmed(), batch_config.policy.to_string().bright_white());
        eprintln!("  {} {}", "Tax rate:".dimmed(), batch_config.tax_rate.to_string().bright_white());
        eprintln!();
    }

    let cancel = Arc::new(AtomicBool::new(false));
    batch_config.cancel = Some(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let report = match &args.page {
        Some(page) => {
            let source = SavedPage::from_file(page).with_context(|| format!("Failed to read page: {}", page))?;
            run_batch(source, batch_config, &queries).await
        }
        None => {
            let fetcher = Fetcher::new(fetch_config).context("Failed to build HTTP client")?;
            run_batch(fetcher, batch_config, &queries).await
        }
    };

    echo::print_summary(&report);
    if report.aborted {
        echo::print_error("Stopped at the first failure (use --policy collect-all to continue past failures)");
    }
    if report.cancelled {
        echo::print_warning("Cancelled");
    }

    let batch_failed = report.aborted || report.cancelled || report.accepted_count() == 0;
    let records = report.into_records();
    print_records(&records, args.format)?;

    if records.is_empty() {
        echo::print_error("No records accepted, nothing written");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(writer) = writer {
        let summary = write_with_retries(&writer, &records, args.write_attempts).await?;
        echo::print_written(&summary);
    } else {
        echo::print_info("Dry run, workbook not written");
    }

    Ok(if batch_failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

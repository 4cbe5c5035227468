//! secbench - Windows security benchmark compliance CLI
//!
//! ## Commands
//!
//! - `run`: evaluate the benchmark catalog on this host and write the report
//! - `render`: re-render an HTML report from a saved JSON report
//! - `list`: show the rules of the catalog

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secbench_core::{
    load_json_report, write_html_report, write_json_report, Aggregate, Catalog, ComplianceRun,
    Harness, HarnessConfig, Rule, RuleContext, RunOutcome, Status,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, Level};

/// Exit code when the score is below `--fail-under`.
const EXIT_BELOW_THRESHOLD: u8 = 1;
/// Exit code when `--fail-on-error` is set and a rule could not be evaluated.
const EXIT_RULE_ERRORS: u8 = 2;

#[derive(Parser)]
#[command(name = "secbench")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Windows security benchmark compliance checker", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every rule of the catalog and write the compliance report
    Run {
        /// HTML report path (replaced if it exists)
        #[arg(short, long, default_value = "secbench-report.html")]
        output: PathBuf,

        /// Also write the report as JSON to this path
        #[arg(long)]
        json_report: Option<PathBuf>,

        /// Maximum rules evaluated at once (1 = sequential)
        #[arg(short, long, default_value = "4")]
        concurrency: usize,

        /// Per-rule timeout in seconds (0 disables the timeout)
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Exit with code 1 when the compliance percentage is below this value
        #[arg(long, value_parser = parse_percentage)]
        fail_under: Option<f64>,

        /// Exit with code 2 when any rule ends in Error
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Re-render an HTML report from a JSON report written by `run`
    Render {
        /// JSON report to read
        #[arg(short, long)]
        input: PathBuf,

        /// HTML report path (replaced if it exists)
        #[arg(short, long, default_value = "secbench-report.html")]
        output: PathBuf,
    },

    /// List the rules of the catalog
    List {
        /// Print the listing as JSON
        #[arg(long)]
        as_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    secbench_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            output,
            json_report,
            concurrency,
            timeout_secs,
            fail_under,
            fail_on_error,
        } => {
            let config = HarnessConfig::default()
                .with_max_concurrent(concurrency)
                .with_rule_timeout(Duration::from_secs(timeout_secs));
            cmd_run(&output, json_report.as_deref(), config, fail_under, fail_on_error).await
        }
        Commands::Render { input, output } => {
            cmd_render(&input, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { as_json } => {
            cmd_list(as_json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the catalog on this host and write the report(s)
async fn cmd_run(
    output: &Path,
    json_report: Option<&Path>,
    config: HarnessConfig,
    fail_under: Option<f64>,
    fail_on_error: bool,
) -> Result<ExitCode> {
    let catalog = load_catalog()?;
    let harness = Harness::new(RuleContext::system(), config);

    println!("Running {} {} ({} rules)", catalog.name(), catalog.version(), catalog.len());
    let outcome = ComplianceRun::execute(&catalog, &harness).await;
    print_outcome(&outcome);

    let document = outcome.document();
    write_html_report(output, &document)
        .with_context(|| format!("Failed to write HTML report to {}", output.display()))?;
    println!("\nReport: {}", output.display());

    if let Some(path) = json_report {
        write_json_report(path, &document)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
        println!("JSON report: {}", path.display());
    }

    let code = exit_code_for(&outcome.aggregate, fail_under, fail_on_error);
    if code != 0 {
        info!(exit_code = code, "run did not meet the requested gate");
    }
    Ok(ExitCode::from(code))
}

/// Re-render an HTML report from a saved JSON report
fn cmd_render(input: &Path, output: &Path) -> Result<()> {
    let document = load_json_report(input)
        .with_context(|| format!("Failed to load JSON report {}", input.display()))?;
    write_html_report(output, &document)
        .with_context(|| format!("Failed to write HTML report to {}", output.display()))?;

    println!("{}", document.title());
    println!("{}", document.summary_line());
    println!("Report: {}", output.display());
    Ok(())
}

#[derive(Serialize)]
struct CatalogListing<'a> {
    name: &'a str,
    version: &'a str,
    digest: String,
    total_possible_points: u32,
    rules: Vec<RuleEntry<'a>>,
}

#[derive(Serialize)]
struct RuleEntry<'a> {
    id: &'a str,
    description: &'a str,
}

/// Print the catalog's rules
fn cmd_list(as_json: bool) -> Result<()> {
    let catalog = load_catalog()?;
    let listing = CatalogListing {
        name: catalog.name(),
        version: catalog.version(),
        digest: catalog.digest(),
        total_possible_points: catalog.total_possible_points(),
        rules: catalog
            .rules()
            .iter()
            .map(|r| RuleEntry {
                id: r.id(),
                description: r.description(),
            })
            .collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{} {}", listing.name, listing.version);
    println!("Digest: {}", listing.digest);
    println!("Points: {}\n", listing.total_possible_points);
    for rule in &listing.rules {
        println!("  {:<10} {}", rule.id, rule.description);
    }
    Ok(())
}

fn load_catalog() -> Result<Catalog> {
    secbench_rules::demo_catalog().context("Failed to build the rule catalog")
}

fn print_outcome(outcome: &RunOutcome) {
    let aggregate = &outcome.aggregate;
    println!();
    for result in aggregate.results() {
        let mark = match result.status() {
            Status::Compliant => "✓",
            Status::NonCompliant => "✗",
            Status::Error => "!",
            Status::Unknown => "?",
        };
        println!(
            "  {} {:<10} {} ({}ms)",
            mark,
            result.id(),
            result.description(),
            result.duration_ms()
        );
    }
    println!();
    println!("Run ID: {}", outcome.metadata.run_id);
    println!("Duration: {}ms", outcome.duration_ms());
    println!(
        "Score: {}/{} points compliant ({:.2}%)",
        aggregate.compliant_count(),
        aggregate.total_possible_points(),
        aggregate.percentage()
    );
    println!(
        "Non-compliant: {}, errors: {}, unknown: {}",
        aggregate.non_compliant_count(),
        aggregate.error_count(),
        aggregate.unknown_count()
    );
}

/// Process exit code for a finished run. Rule errors outrank the threshold.
fn exit_code_for(aggregate: &Aggregate, fail_under: Option<f64>, fail_on_error: bool) -> u8 {
    if fail_on_error && aggregate.has_errors() {
        return EXIT_RULE_ERRORS;
    }
    match fail_under {
        Some(threshold) if aggregate.percentage() < threshold => EXIT_BELOW_THRESHOLD,
        _ => 0,
    }
}

fn parse_percentage(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("percentage must be between 0 and 100, got {value}"))
    }
}

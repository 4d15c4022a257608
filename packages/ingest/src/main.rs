#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the stop-and-search importer.

use clap::{Parser, Subcommand};
use police_data_cli_utils::IndicatifProgress;
use police_data_ingest::{CancelFlag, ImportConfig, fetch_status, recent_failures, total_records};
use police_data_ingest_models::{ImportStatus, ImportSummary};
use police_data_stop_search_models::FetchAttempt;

#[derive(Parser)]
#[command(
    name = "police_data_ingest",
    about = "Import police stop-and-search records into DuckDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every month from the start period through the current month
    /// (the default when no command is given)
    Import,
    /// Print the fetch ledger without requesting anything
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = police_data_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = ImportConfig::from_env();

    match cli.command.unwrap_or(Commands::Import) {
        Commands::Status => {
            print_ledger(&fetch_status(&config.db_path)?);
        }
        Commands::Import => {
            println!("Police stop and search import");
            println!("  Force:         {}", config.force);
            println!("  Start period:  {}", config.start_period);
            println!(
                "  Request delay: {:.1}s",
                config.request_delay.as_secs_f64()
            );
            println!("  Database:      {}", config.db_path.display());
            println!();

            let cancel = CancelFlag::new();
            spawn_interrupt_handler(cancel.clone());

            let progress = IndicatifProgress::steps_bar(&multi, "Periods", 0);
            let today = chrono::Local::now().date_naive();
            let summary =
                police_data_ingest::run_configured_import(&config, today, progress, &cancel)
                    .await?;

            print_report(&summary);

            println!(
                "Total records in database: {}",
                total_records(&config.db_path)?
            );

            let failures = recent_failures(&config.db_path)?;
            if failures.is_empty() {
                println!("No recent failures!");
            } else {
                println!("Recent failures:");
                for attempt in &failures {
                    println!(
                        "  {} {}: {}",
                        attempt.force,
                        attempt.period,
                        attempt.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }
    }

    Ok(())
}

/// The first Ctrl-C stops the import at the next period boundary; a second
/// one exits immediately.
fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::warn!("Interrupt received, stopping after the current period (Ctrl-C again to exit now)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            log::error!("Second interrupt received, exiting");
            std::process::exit(130);
        }
    });
}

fn print_report(summary: &ImportSummary) {
    println!();
    match summary.status {
        ImportStatus::Completed => println!("Import complete for {}", summary.force),
        ImportStatus::Interrupted => println!("Import interrupted for {}", summary.force),
        ImportStatus::NothingToDo => {
            println!("Nothing to import for {}", summary.force);
            return;
        }
        ImportStatus::ProbeFailed => {
            println!(
                "API check failed for {}; no periods were attempted",
                summary.force
            );
            return;
        }
    }
    println!(
        "  Periods:   {} successful, {} failed ({} planned)",
        summary.successful_periods, summary.failed_periods, summary.periods_planned
    );
    println!(
        "  Records:   {} returned, {} inserted",
        summary.records_returned, summary.records_inserted
    );
    println!("  Duration:  {:.1}s", summary.duration.as_secs_f64());
}

fn print_ledger(attempts: &[FetchAttempt]) {
    if attempts.is_empty() {
        println!("No fetch attempts recorded yet.");
        return;
    }

    println!(
        "{:<16} {:<8} {:<7} {:>8} {:>8}  {:<26} ERROR",
        "FORCE", "PERIOD", "STATUS", "RETURNED", "INSERTED", "FETCHED AT"
    );
    println!("{}", "-".repeat(100));
    for attempt in attempts {
        println!(
            "{:<16} {:<8} {:<7} {:>8} {:>8}  {:<26} {}",
            attempt.force,
            attempt.period.to_string(),
            if attempt.success { "ok" } else { "failed" },
            attempt.record_count,
            attempt.inserted_count,
            attempt
                .fetched_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            attempt.error_message.as_deref().unwrap_or(""),
        );
    }
}

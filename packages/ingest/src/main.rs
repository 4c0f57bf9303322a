#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for computing Hub'Eau reference curves.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use water_norms_cli_utils::IndicatifProgress;
use water_norms_ingest::config::PipelineConfig;
use water_norms_ingest::export::{export_batch, threshold_names};
use water_norms_ingest::pipeline::run_batch;
use water_norms_source::fetcher::PaginatedFetcher;

#[derive(Parser)]
#[command(
    name = "water_norms_ingest",
    about = "Reference curves for river discharge and groundwater levels"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured station, compute curves and export charts
    Run {
        /// Path to the TOML configuration
        #[arg(long)]
        config: PathBuf,
        /// Directory receiving the CSV and JSON files
        #[arg(long)]
        output: PathBuf,
        /// Comma-separated station ids to run (default: all)
        #[arg(long)]
        stations: Option<String>,
        /// Stations fetched concurrently (overrides `[fetch] concurrency`)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List the configured stations
    Stations {
        /// Path to the TOML configuration
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = water_norms_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            stations,
            concurrency,
        } => {
            let config = PipelineConfig::load(&config)?;
            let ids: Option<Vec<String>> = stations.map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            });
            let selected = config.select_stations(ids.as_deref());
            if selected.is_empty() {
                log::warn!("No stations to run");
                return Ok(());
            }

            let concurrency = concurrency.unwrap_or(config.fetch.concurrency);
            log::info!(
                "Running {} stations (concurrency={concurrency})",
                selected.len()
            );

            let start = Instant::now();
            let records = IndicatifProgress::records_bar(&multi, "downloading");
            let fetcher =
                PaginatedFetcher::http(config.fetch.to_fetch_config())?.with_progress(records.clone());
            let bar = IndicatifProgress::stations_bar(&multi, selected.len() as u64);

            let report = run_batch(&fetcher, &selected, &config.reference, concurrency, &bar).await;
            records.finish_and_clear();

            let written = export_batch(&output, &report, &config.reference)?;

            for station in &report.stations {
                if let Err(e) = &station.outcome {
                    log::error!("[{}] {e}", station.station.id);
                }
            }
            for composite in &report.composites {
                if let Err(e) = &composite.outcome {
                    log::error!("[{}] {e}", composite.group);
                }
            }

            log::info!(
                "Done: {written} charts, {} failed stations, {} incomplete, {:.1}s",
                report.failed(),
                report.partial(),
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Stations { config } => {
            let config = PipelineConfig::load(&config)?;
            println!("{:<16} {:<18} {:<24} TITLE", "ID", "KIND", "GROUP");
            println!("{}", "-".repeat(80));
            for station in &config.stations {
                println!(
                    "{:<16} {:<18} {:<24} {}",
                    station.id,
                    station.kind.as_ref(),
                    station.group.as_deref().unwrap_or("-"),
                    station.display_title()
                );
            }

            let thresholds = threshold_names(&config.stations);
            if !thresholds.is_empty() {
                println!();
                for (name, count) in thresholds {
                    println!("{name}: {count} stations");
                }
            }
        }
    }

    Ok(())
}

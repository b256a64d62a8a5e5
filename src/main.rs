use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use county_choropleth::{
    classify::ThresholdTable, config, data, processing, render, report, server, spatial::RegionIndex,
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RangeArgs {
    /// Youngest age in the selection (overrides [selection] in the config)
    #[arg(long)]
    min_age: Option<u32>,
    /// Oldest age in the selection
    #[arg(long)]
    max_age: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the styled GeoJSON layer and map tiles for an age range
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Write a per-county CSV summary for an age range
    Report {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
        /// Output file; stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Serve the map and the recompute API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `report` can write CSV to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config, range } => {
            info!("Generating map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let table = ThresholdTable::from_config(&app_config.classification)
                .context("Invalid classification thresholds")?;
            let range = app_config.selected_range(range.min_age, range.max_age);

            // 1. Load Data
            let dataset = data::load_data(&app_config)?;

            // 2. Aggregate and classify
            let stats = processing::compute_stats(&dataset, &table, range);
            let summary = processing::summarize(&stats);
            info!(
                "Ages {}: {} of {} people across {} regions ({} without data)",
                range, summary.selected, summary.total, summary.regions, summary.regions_without_data
            );

            // 3. Styled layer
            let layer = render::build_layer(&dataset, &stats, range, app_config.classification.no_data_color);
            render::write_layer(&app_config.output.layer, &layer)?;

            // 4. Tiles
            let index = RegionIndex::build(&dataset.regions);
            render::generate_tiles(&app_config, &dataset, &index, &stats, range)?;

            info!("Generation complete!");
        }
        Commands::Report { config, range, output } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let table = ThresholdTable::from_config(&app_config.classification)
                .context("Invalid classification thresholds")?;
            let range = app_config.selected_range(range.min_age, range.max_age);

            let dataset = data::load_data(&app_config)?;
            let stats = processing::compute_stats(&dataset, &table, range);
            let no_data = app_config.classification.no_data_color;

            match output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Failed to create report file: {:?}", path))?;
                    report::write_report(BufWriter::new(file), &stats, no_data)?;
                    info!("Wrote report for {} regions to {:?}", stats.len(), path);
                }
                None => report::write_report(io::stdout().lock(), &stats, no_data)?,
            }
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let dataset = data::load_data(&app_config)?;
            server::start_server(app_config, dataset).await?;
        }
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use irradiance_ingestion::{
    config::{AppConfig, MisalignedPolicy},
    observability,
    report::{self, ReportRange},
};
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;

/// Write estimated-actuals and grid-aligned forecast CSVs for one or more
/// resources.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Database name, or a full postgres:// URI
    database: String,
    /// Resource id, or a JSON file listing sites
    rid: String,
    /// Range start, e.g. 2023-01-01T00:00:00+0000 (default: to - 24h)
    #[arg(long, value_parser = report::parse_bound)]
    fr: Option<OffsetDateTime>,
    /// Range end (default: fr + 24h, or now)
    #[arg(long, value_parser = report::parse_bound)]
    to: Option<OffsetDateTime>,
    /// Directory the CSV files are written to (overrides the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Length in days of each forecast query (overrides the config file)
    #[arg(long)]
    chunk_days: Option<u32>,
    /// Skip forecast polls that do not line up with the 5 minute grid
    #[arg(long)]
    skip_misaligned: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args = Args::parse();
    let mut cfg = AppConfig::load()?;

    if let Some(dir) = args.output_dir {
        cfg.report.output_dir = dir;
    }
    if let Some(days) = args.chunk_days {
        cfg.report.chunk_days = days;
    }
    if args.skip_misaligned {
        cfg.report.on_misaligned = MisalignedPolicy::Skip;
    }

    let range = ReportRange::resolve(args.fr, args.to, OffsetDateTime::now_utc());
    let resource_ids = report::load_resource_ids(&args.rid)?;
    tracing::info!(resources = ?resource_ids, "reporting");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.connect_url(&args.database))
        .await
        .context("failed to connect to database")?;

    for resource_id in &resource_ids {
        let summary = report::generate(&pool, resource_id, &range, &cfg.report)
            .await
            .with_context(|| format!("report for {resource_id} failed"))?;
        tracing::info!(
            resource_id = %resource_id,
            actual_rows = summary.actual_rows,
            forecast_rows = summary.forecast_rows,
            skipped_polls = summary.skipped_polls,
            actuals = %summary.actuals_path.display(),
            forecasts = %summary.forecasts_path.display(),
            "reports written"
        );
    }

    Ok(())
}

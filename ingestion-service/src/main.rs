use anyhow::{Context, Result};
use clap::Parser;
use irradiance_client::domain::Quantity;
use irradiance_ingestion::{
    config::AppConfig,
    observability::{self, TracingObserver},
    pipeline::Pipeline,
    sinks::{create_tables, PgPollSink},
    sources::SolcastHttpSource,
    transform::{run_anchor, IngestMode},
};
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;

/// Download forecasts or estimated actuals for every tagged site and store
/// them in Postgres.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// API key for the irradiance service
    key: String,
    /// Database name, or a full postgres:// URI
    database: String,
    /// Request / table name: forecasts or estimated_actuals
    #[arg(long, default_value = "forecasts")]
    quantity: Quantity,
    /// Create the database tables if they do not exist
    #[arg(long)]
    create: bool,
    /// Maximum number of time points to take per site
    #[arg(long, default_value_t = 12 * 24)]
    take: usize,
    /// Store one row per time point instead of one row per poll
    #[arg(long)]
    flatten: bool,
    /// Site tag to search for (overrides the config file)
    #[arg(long)]
    tag: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args = Args::parse();
    let anchor = run_anchor(OffsetDateTime::now_utc());
    tracing::debug!(%anchor, "set run timestamp");

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.connect_url(&args.database))
        .await
        .context("failed to connect to database")?;

    if args.create {
        create_tables(&pool, args.quantity).await?;
    }

    let tag = args.tag.as_deref().unwrap_or(&cfg.api.site_tag);
    let source = SolcastHttpSource::new(&cfg.api, &args.key, tag)?;
    let sink = PgPollSink::new(pool, cfg.sink.batch_size);

    let pipeline = Pipeline {
        source,
        sink,
        quantity: args.quantity,
        mode: IngestMode::from_flatten_flag(args.flatten),
        take: args.take,
    };

    let summary = pipeline.run(anchor, &TracingObserver).await?;
    tracing::info!(inserted_rows = summary.inserted_rows, "terminating");

    Ok(())
}

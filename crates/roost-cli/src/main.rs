use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roost_adapters::{DefaultAdapterFactory, HttpFetcher};
use roost_core::crawl::{CrawlOptions, CrawlService};
use roost_core::dedup::ListingStore;
use roost_core::registry::SourceRegistry;
use roost_core::traits::ListingBackend;
use roost_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "roost", version, about = "Rental-listing ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawl for one source synchronously
    Crawl {
        /// Source id to crawl
        #[arg(short, long)]
        source: String,

        /// Maximum pages to fetch
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum listings to collect
        #[arg(long)]
        max_listings: Option<usize>,

        /// Fetch and normalize only; leave the store untouched
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List registered sources
    Sources {
        /// Only enabled sources
        #[arg(long, default_value_t = false)]
        enabled: bool,
    },

    /// Show per-source health classification
    Health {
        /// Limit the report to one source
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Export canonical listings as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of listings to export
        #[arg(short, long, default_value_t = 1000)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roost=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            source,
            max_pages,
            max_listings,
            dry_run,
        } => {
            let db = connect_db().await?;
            cmd_crawl(&db, &source, max_pages, max_listings, dry_run).await?;
        }
        Commands::Sources { enabled } => {
            let db = connect_db().await?;
            cmd_sources(&db, enabled).await?;
        }
        Commands::Health { source } => {
            let db = connect_db().await?;
            cmd_health(&db, source.as_deref()).await?;
        }
        Commands::Export { output, limit } => {
            let db = connect_db().await?;
            cmd_export(&db, output.as_deref(), limit).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

async fn cmd_crawl(
    db: &Database,
    source_id: &str,
    max_pages: Option<u32>,
    max_listings: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    // The CLI runs on the operator's machine; local endpoints are fine.
    let fetcher = HttpFetcher::new()
        .map_err(|e| anyhow::anyhow!(e))?
        .allow_private_urls();
    let factory = DefaultAdapterFactory::with_fetcher(fetcher);
    let service = CrawlService::new(
        factory,
        ListingStore::new(db.listing_repo()),
        db.health_repo(),
        db.source_repo(),
    );

    let options = CrawlOptions {
        max_pages,
        max_listings,
        dry_run,
    };
    let result = service
        .run_crawl(source_id, &options)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_sources(db: &Database, enabled_only: bool) -> Result<()> {
    let registry = SourceRegistry::new(db.source_repo(), db.health_repo());
    let sources = registry
        .list_sources(enabled_only)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if sources.is_empty() {
        println!("No sources registered.");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<20} {:>8}  enabled", "id", "name", "kind", "priority");
    for source in sources {
        println!(
            "{:<16} {:<24} {:<20} {:>8}  {}",
            source.id,
            source.name,
            source.kind.as_str(),
            source.priority,
            source.enabled
        );
    }
    Ok(())
}

async fn cmd_health(db: &Database, source_id: Option<&str>) -> Result<()> {
    let registry = SourceRegistry::new(db.source_repo(), db.health_repo());
    let report = registry
        .health_report()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let rows: Vec<_> = report
        .into_iter()
        .filter(|r| source_id.is_none_or(|id| r.source_id == id))
        .collect();

    if rows.is_empty() {
        anyhow::bail!("No matching sources.");
    }

    println!("{:<16} {:<10} {:>12}  last error", "id", "status", "failure rate");
    for row in rows {
        println!(
            "{:<16} {:<10} {:>11.0}%  {}",
            row.source_id,
            row.status.to_string(),
            row.failure_rate * 100.0,
            row.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_export(db: &Database, output: Option<&std::path::Path>, limit: usize) -> Result<()> {
    let listings = db
        .listing_repo()
        .list_canonical(limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path).context("Failed to create output")?),
        None => Box::new(std::io::stdout()),
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "id",
        "source_id",
        "street_address",
        "unit",
        "neighborhood",
        "borough",
        "price",
        "beds",
        "baths",
        "status",
        "first_seen_at",
        "last_seen_at",
        "source_url",
    ])?;

    let count = listings.len();
    for listing in listings {
        csv_writer.write_record([
            listing.id.to_string(),
            listing.source_id,
            listing.street_address,
            listing.unit.unwrap_or_default(),
            listing.neighborhood.unwrap_or_default(),
            listing.borough.unwrap_or_default(),
            listing.price.to_string(),
            listing.beds.to_string(),
            listing.baths.to_string(),
            listing.status.to_string(),
            listing.first_seen_at.to_rfc3339(),
            listing.last_seen_at.to_rfc3339(),
            listing.source_url,
        ])?;
    }
    csv_writer.flush()?;

    tracing::info!(%count, "Exported canonical listings");
    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use rental_scout::config::Settings;
use rental_scout::scrapers::SourceSelection;
use rental_scout::{ScrapeOutcome, ScrapeRequest, ScrapeService};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Scrape Envigado rental listings into a local catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape one or all sources and reconcile the catalog
    Scrape {
        /// Source identifier, or "all"
        #[arg(short, long, default_value = "all")]
        source: SourceSelection,

        /// Ignore the cooldown window
        #[arg(short, long)]
        force: bool,

        /// Minimum monthly rent (COP); needs --price-max
        #[arg(long)]
        price_min: Option<i64>,

        /// Maximum monthly rent (COP); needs --price-min
        #[arg(long)]
        price_max: Option<i64>,
    },
    /// Active properties, newest first
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Active properties with coordinates
    Locations,
    /// Registered source identifiers
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let cli = Cli::parse();
    let service = ScrapeService::from_settings(&settings).await?;

    match cli.command {
        Command::Scrape {
            source,
            force,
            price_min,
            price_max,
        } => {
            let request = ScrapeRequest {
                source,
                force,
                price_min,
                price_max,
            };
            let outcome = service.run(&request).await?;
            match &outcome {
                ScrapeOutcome::Cached { last_scraped_at } => {
                    info!(%last_scraped_at, "Data is fresh, use --force to scrape anyway")
                }
                ScrapeOutcome::Completed(stats) => {
                    info!(
                        created = stats.created,
                        soft_deleted = stats.soft_deleted,
                        "Scrape completed"
                    )
                }
            }
            print_json(&outcome)?;
        }
        Command::List { skip, limit } => {
            let properties = service.catalog().active_properties(skip, limit).await?;
            print_json(&properties)?;
        }
        Command::Locations => {
            let locations = service.catalog().property_locations().await?;
            print_json(&locations)?;
        }
        Command::Sources => {
            print_json(&service.registry().sources())?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

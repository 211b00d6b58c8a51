#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the land value lookup tool.

use clap::{Parser, Subcommand};
use land_value_cache::LandValueCache;
use land_value_lookup::LookupService;
use land_value_source::JurisdictionRouter;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "land_value", about = "German reference land value lookup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the Bodenrichtwert at a WGS84 coordinate
    Lookup {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Jurisdiction name, code or alias (e.g. "NRW", "Thüringen", "BE")
        #[arg(long)]
        jurisdiction: String,
        /// Neither read nor write the result cache
        #[arg(long, conflicts_with = "refresh")]
        no_cache: bool,
        /// Skip the cache read but store a fresh result
        #[arg(long)]
        refresh: bool,
    },
    /// Probe upstream availability
    Health {
        /// Only probe this jurisdiction. All registered adapters otherwise.
        #[arg(long)]
        jurisdiction: Option<String>,
    },
    /// List registered jurisdictions and their adapter descriptors
    Jurisdictions,
    /// Inspect or maintain the result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry counts and configuration
    Stats,
    /// Remove expired entries
    Cleanup,
    /// Remove every entry
    Clear,
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup {
            lat,
            lon,
            jurisdiction,
            no_cache,
            refresh,
        } => {
            let service = if no_cache {
                LookupService::new(JurisdictionRouter::new(), None)
            } else {
                LookupService::from_env()?
            };
            let outcome = if refresh {
                service.lookup_uncached(lat, lon, &jurisdiction).await?
            } else {
                service.lookup(lat, lon, &jurisdiction).await?
            };
            print_json(&outcome)?;
        }
        Commands::Health { jurisdiction } => {
            let service = LookupService::new(JurisdictionRouter::new(), None);
            let report = match jurisdiction {
                Some(name) => vec![service.health(&name).await],
                None => service.health_report().await,
            };
            let down = report.iter().filter(|entry| !entry.healthy).count();
            log::info!("{} adapter(s) probed, {down} unhealthy", report.len());
            print_json(&report)?;
        }
        Commands::Jurisdictions => {
            print_json(&JurisdictionRouter::new().descriptors())?;
        }
        Commands::Cache { action } => {
            let cache = LandValueCache::open_default()?;
            match action {
                CacheCommand::Stats => print_json(&cache.stats()?)?,
                CacheCommand::Cleanup => println!("Removed {} expired entries", cache.cleanup()?),
                CacheCommand::Clear => println!("Removed {} entries", cache.clear()?),
            }
        }
    }

    Ok(())
}

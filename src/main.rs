//! SIF STAC Catalog Generator
//!
//! Generates and incrementally updates a static STAC catalog for a
//! directory of dated SIF GeoTIFF files.
//!
//! Usage:
//!     sif-stac create --data-dir data --output stac --repo-url https://github.com/user/repo
//!     sif-stac update --data-dir data --stac-dir stac --repo-url https://github.com/user/repo
//!     sif-stac update --data-dir data --stac-dir stac --repo-url https://github.com/user/repo --force

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sif_stac::{create_catalog, update_catalog, CatalogConfig};

#[derive(Parser)]
#[command(name = "sif-stac")]
#[command(about = "Generate a static STAC catalog for SIF GeoTIFF rasters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full catalog from scratch
    Create {
        /// Directory containing SIF_YYYYMMDD.tif files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Output directory for the STAC document tree
        #[arg(short, long, default_value = "stac")]
        output: PathBuf,

        /// GitHub repository URL hosting data and catalog
        #[arg(short, long)]
        repo_url: String,

        /// Collection title
        #[arg(long, default_value = "SIF Collection")]
        title: String,

        /// Collection description
        #[arg(long, default_value = "Daily Solar-Induced Fluorescence measurements")]
        description: String,
    },
    /// Add items for new rasters to an existing catalog
    Update {
        /// Directory containing SIF_YYYYMMDD.tif files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory containing the existing STAC catalog
        #[arg(short, long, default_value = "stac")]
        stac_dir: PathBuf,

        /// GitHub repository URL hosting data and catalog
        #[arg(short, long)]
        repo_url: String,

        /// Regenerate all items, including existing ones
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            data_dir,
            output,
            repo_url,
            title,
            description,
        } => {
            let config = CatalogConfig {
                data_dir,
                output_dir: output,
                repo_url,
                collection_title: title,
                collection_description: description,
            };
            let summary = create_catalog(&config)
                .with_context(|| format!("building catalog in {:?}", config.output_dir))?;

            let [min_lon, min_lat, max_lon, max_lat] = summary.extent.bbox;
            println!("\n=== Catalog created ===");
            println!("Items: {}", summary.items);
            println!(
                "Temporal extent: {} to {}",
                summary.extent.start.date_naive(),
                summary.extent.end.date_naive()
            );
            println!("Spatial extent: [{min_lon:.2}, {min_lat:.2}, {max_lon:.2}, {max_lat:.2}]");
        }

        Commands::Update {
            data_dir,
            stac_dir,
            repo_url,
            force,
        } => {
            let summary = update_catalog(&data_dir, &stac_dir, &repo_url, force)
                .with_context(|| format!("updating catalog in {:?}", stac_dir))?;

            println!("\n=== Catalog updated ===");
            println!("New items added: {}", summary.added);
            println!("Existing items: {}", summary.skipped);
            if summary.added == 0 && !force {
                println!("Catalog is up to date.");
            }
        }
    }

    Ok(())
}

//! Modaics similar-item recommender CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Embed a folder of product photos into a catalog
//! modaics build-catalog --images data/train_images --out assets
//!
//! # Five most similar catalog items for a photo
//! modaics --config modaics.toml recommend --image query.jpg -k 5 --scores
//!
//! # Neighbours of an item already in the catalog
//! modaics similar --id denim-jacket.jpg
//!
//! # Run without model weights (deterministic hash vectors)
//! modaics --stub-encoder inspect
//! ```
//!
//! Results are printed to stdout as JSON. Logs go to stderr.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::build_catalog::BuildCatalogArgs;
use commands::recommend::RecommendArgs;
use commands::similar::SimilarArgs;
use commands::AppContext;

/// Modaics visual recommender.
#[derive(Parser, Debug)]
#[command(name = "modaics", version)]
#[command(about = "Find catalog items that look like a query image")]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the hash-based stub encoder instead of ResNet-50 weights.
    #[arg(long, global = true)]
    stub_encoder: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recommend catalog items similar to an image file
    Recommend(RecommendArgs),

    /// Recommend catalog items similar to a catalog item
    Similar(SimilarArgs),

    /// Embed a directory of images and write the catalog files
    BuildCatalog(BuildCatalogArgs),

    /// Print catalog and encoder details
    Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = AppContext::load(cli.config.as_deref(), cli.stub_encoder)?;

    let output = match cli.command {
        Commands::Recommend(args) => commands::recommend::run(args, &ctx).await?,
        Commands::Similar(args) => commands::similar::run(&args, &ctx)?,
        Commands::BuildCatalog(args) => commands::build_catalog::run(&args, &ctx)?,
        Commands::Inspect => commands::inspect::run(&ctx)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

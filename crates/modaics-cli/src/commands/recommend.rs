//! `recommend`: similar catalog items for a query image file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tracing::info;

use super::{render_results, AppContext};

/// Arguments for the recommend command.
#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Query image (PNG, JPEG, WebP or GIF)
    #[arg(long)]
    pub image: PathBuf,

    /// Number of results (defaults to [ranking] default_k)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Include similarity scores in the output
    #[arg(long)]
    pub scores: bool,

    /// Catalog identifiers to leave out of the results
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Give up after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub async fn run(args: RecommendArgs, ctx: &AppContext) -> Result<Value> {
    let image = fs::read(&args.image)
        .with_context(|| format!("cannot read query image {}", args.image.display()))?;
    let service = ctx.service()?;
    let k = args.k.unwrap_or_else(|| service.default_k());

    let results = match args.timeout_ms {
        Some(timeout_ms) => {
            Arc::new(service)
                .recommend_within(image, k, args.exclude, Duration::from_millis(timeout_ms))
                .await?
        }
        None => {
            let excluded: Vec<&str> = args.exclude.iter().map(String::as_str).collect();
            service.recommend_excluding(&image, k, &excluded)?
        }
    };
    info!(
        "Returned {} recommendations for {}",
        results.len(),
        args.image.display()
    );
    render_results(results, args.scores)
}

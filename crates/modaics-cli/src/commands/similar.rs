//! `similar`: neighbours of an item already in the catalog.

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tracing::info;

use super::{render_results, AppContext};

/// Arguments for the similar command.
#[derive(Args, Debug)]
pub struct SimilarArgs {
    /// Catalog identifier, e.g. a file name from Filenames.json
    #[arg(long)]
    pub id: String,

    /// Number of results (defaults to [ranking] default_k)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Include similarity scores in the output
    #[arg(long)]
    pub scores: bool,
}

pub fn run(args: &SimilarArgs, ctx: &AppContext) -> Result<Value> {
    let service = ctx.service()?;
    let k = args.k.unwrap_or_else(|| service.default_k());

    let results = service.similar_to(&args.id, k)?;
    info!("Found {} items similar to {}", results.len(), args.id);
    render_results(results, args.scores)
}

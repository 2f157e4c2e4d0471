//! `build-catalog`: embed an image directory into catalog files.
//!
//! Files are taken in sorted filename order and filtered to `.jpg`, `.jpeg`
//! and `.png` (case-insensitive). The file name becomes the identifier.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::{json, Value};
use tracing::{debug, info};

use modaics_recommender::CatalogStore;

use super::AppContext;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Arguments for the build-catalog command.
#[derive(Args, Debug)]
pub struct BuildCatalogArgs {
    /// Directory of product images
    #[arg(long)]
    pub images: PathBuf,

    /// Output directory for Embeddings.json and Filenames.json
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &BuildCatalogArgs, ctx: &AppContext) -> Result<Value> {
    let files = collect_images(&args.images)?;
    if files.is_empty() {
        bail!(
            "no .jpg, .jpeg or .png files found in {}",
            args.images.display()
        );
    }

    let encoder = ctx.encoder()?;
    info!(
        "Embedding {} images from {} with '{}'",
        files.len(),
        args.images.display(),
        encoder.model_name()
    );

    let mut vectors = Vec::with_capacity(files.len());
    let mut identifiers = Vec::with_capacity(files.len());
    for (i, (name, path)) in files.into_iter().enumerate() {
        let bytes =
            fs::read(&path).with_context(|| format!("cannot read image {}", path.display()))?;
        let vector = encoder
            .encode(&bytes)
            .with_context(|| format!("failed to embed {}", path.display()))?;
        debug!(index = i, file = name.as_str(), "Embedded image");

        vectors.push(vector.into_inner());
        identifiers.push(name);
    }

    let catalog = CatalogStore::from_parts(vectors, identifiers)?;
    catalog.write_json(&args.out)?;

    Ok(json!({
        "entries": catalog.size(),
        "dimension": catalog.dimension(),
        "encoder": encoder.model_name(),
        "out": args.out.display().to_string(),
    }))
}

/// `(file name, path)` for every supported image in `dir`, sorted by name.
fn collect_images(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read image directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !has_image_extension(&path) {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        files.push((name, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

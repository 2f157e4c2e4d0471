//! CLI command handlers
//!
//! # Modules
//!
//! - `recommend`: Similar items for a query image file
//! - `similar`: Similar items for a catalog identifier
//! - `build_catalog`: Embed an image directory into `Embeddings.json` / `Filenames.json`
//! - `inspect`: Catalog size, dimension and encoder name
//!
//! Every handler returns the JSON value that `main` prints.

pub mod build_catalog;
pub mod inspect;
pub mod recommend;
pub mod similar;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use modaics_recommender::{
    CatalogStore, ImageEncoder, RankedResult, RecommendationService, RecommenderConfig,
    ResNetEncoder, StubEncoder, DEFAULT_DIMENSION,
};

/// Configuration and encoder choice shared by all commands.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: RecommenderConfig,
    pub stub_encoder: bool,
}

impl AppContext {
    /// Read `config_path` (or defaults), apply `MODAICS_*` overrides, validate.
    pub fn load(config_path: Option<&Path>, stub_encoder: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                RecommenderConfig::from_file(path)?
            }
            None => RecommenderConfig::default(),
        }
        .with_env_overrides();

        Self::new(config, stub_encoder)
    }

    pub fn new(config: RecommenderConfig, stub_encoder: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stub_encoder,
        })
    }

    /// Load the catalog and encoder and bring a service to `Ready`.
    pub fn service(&self) -> Result<RecommendationService> {
        if !self.stub_encoder {
            return RecommendationService::from_config(&self.config)
                .context("recommendation service failed to start");
        }

        let catalog = CatalogStore::from_config(&self.config.catalog)?;
        let encoder = StubEncoder::new(catalog.dimension());
        let service = RecommendationService::ready(
            Arc::new(catalog),
            Arc::new(encoder),
            self.config.ranking.clone(),
        )?;
        Ok(service)
    }

    /// Encoder used to build a new catalog.
    pub fn encoder(&self) -> Result<Arc<dyn ImageEncoder>> {
        if self.stub_encoder {
            let dimension = self
                .config
                .catalog
                .expected_dimension
                .unwrap_or(DEFAULT_DIMENSION);
            return Ok(Arc::new(StubEncoder::new(dimension)));
        }

        let encoder = ResNetEncoder::load(&self.config.encoder)
            .context("failed to load ResNet-50 weights")?;
        Ok(Arc::new(encoder))
    }
}

/// Identifiers only, or `{score, id}` objects when `with_scores`.
pub(crate) fn render_results(results: Vec<RankedResult>, with_scores: bool) -> Result<Value> {
    if with_scores {
        return Ok(serde_json::to_value(results)?);
    }
    let ids: Vec<String> = results.into_iter().map(|r| r.id).collect();
    Ok(Value::from(ids))
}

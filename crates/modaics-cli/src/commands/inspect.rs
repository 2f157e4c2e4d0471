//! `inspect`: catalog and encoder details.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use super::AppContext;

#[derive(Debug, Serialize)]
struct Summary {
    catalog_size: usize,
    dimension: usize,
    encoder: String,
    default_k: usize,
    vectors_path: String,
    identifiers_path: String,
}

pub fn run(ctx: &AppContext) -> Result<Value> {
    let service = ctx.service()?;
    let catalog = service
        .catalog()
        .ok_or(modaics_recommender::RecommendError::NotReady)?;
    let encoder = service
        .encoder()
        .ok_or(modaics_recommender::RecommendError::NotReady)?;

    let summary = Summary {
        catalog_size: catalog.size(),
        dimension: catalog.dimension(),
        encoder: encoder.model_name().to_string(),
        default_k: service.default_k(),
        vectors_path: ctx.config.catalog.vectors_path.display().to_string(),
        identifiers_path: ctx.config.catalog.identifiers_path.display().to_string(),
    };
    Ok(serde_json::to_value(summary)?)
}

//! Visual similarity recommendations for Modaics.
//!
//! Given a query image, returns the catalog items whose precomputed image
//! embeddings are closest by cosine similarity.
//!
//! # Architecture
//!
//! - **CatalogStore**: Immutable `(identifier, vector)` pairs loaded once at startup
//! - **ImageEncoder**: Trait for image → feature vector conversion
//! - **ResNetEncoder**: ResNet-50 backbone via candle (2048D)
//! - **StubEncoder**: Deterministic stub for development
//! - **SimilarityRanker**: Exhaustive cosine scoring with stable top-K selection
//! - **RecommendationService**: Encoder + ranker over the loaded catalog
//!
//! # Example
//!
//! ```rust,ignore
//! use modaics_recommender::{RecommendationService, RecommenderConfig};
//!
//! let config = RecommenderConfig::from_file("modaics.toml")?.with_env_overrides();
//! let service = RecommendationService::from_config(&config)?;
//! let ids = service.recommend(&std::fs::read("query.jpg")?, 5)?;
//! ```

pub mod catalog;
pub mod config;
pub mod encoder;
pub mod error;
pub mod service;
pub mod similarity;
pub mod types;

pub use catalog::CatalogStore;
pub use config::{CatalogConfig, EncoderConfig, RankingConfig, RecommenderConfig};
pub use encoder::{ImageEncoder, ImageProcessor, ResNetEncoder, ResizePolicy, StubEncoder};
pub use error::{RecommendError, RecommendResult};
pub use service::{RecommendationService, ServiceState};
pub use similarity::{cosine_similarity, SimilarityRanker};
pub use types::{CatalogEntry, FeatureVector, RankedResult};

/// Default feature dimension (ResNet-50 without its classifier).
pub const DEFAULT_DIMENSION: usize = encoder::RESNET50_DIMENSION;

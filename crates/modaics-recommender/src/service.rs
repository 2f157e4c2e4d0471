//! Recommendation service: encoder → ranker over the loaded catalog.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──initialize(catalog, encoder)──▶ Ready
//! ```
//!
//! The transition happens at most once and is irreversible. Every query in
//! `Uninitialized` fails with `NotReady`. The ready state is published
//! through a write-once cell, so queries read it without locking.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogStore;
use crate::config::{RankingConfig, RecommenderConfig};
use crate::encoder::{ImageEncoder, ResNetEncoder};
use crate::error::{RecommendError, RecommendResult};
use crate::similarity::SimilarityRanker;
use crate::types::RankedResult;

/// Lifecycle state of a [`RecommendationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Ready,
}

struct Ready {
    catalog: Arc<CatalogStore>,
    encoder: Arc<dyn ImageEncoder>,
}

/// Similar-item recommender.
///
/// Construct once at startup and share by reference or `Arc`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use modaics_recommender::{CatalogStore, RecommendationService, RankingConfig, StubEncoder};
///
/// let encoder = StubEncoder::new(4);
/// let catalog = CatalogStore::from_parts(
///     vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
///     vec!["shirt.jpg".into(), "boots.jpg".into()],
/// ).unwrap();
///
/// let service = RecommendationService::ready(
///     Arc::new(catalog),
///     Arc::new(encoder),
///     RankingConfig::default(),
/// ).unwrap();
///
/// let ids = service.recommend(b"any image bytes", 1).unwrap();
/// assert_eq!(ids.len(), 1);
/// ```
pub struct RecommendationService {
    state: OnceCell<Ready>,
    ranker: SimilarityRanker,
    default_k: usize,
}

impl RecommendationService {
    /// Create an uninitialized service.
    #[must_use]
    pub fn new(config: RankingConfig) -> Self {
        Self {
            state: OnceCell::new(),
            ranker: SimilarityRanker::new(config.parallel_threshold),
            default_k: config.default_k,
        }
    }

    /// Create and initialize in one step.
    ///
    /// # Errors
    /// See [`RecommendationService::initialize`].
    pub fn ready(
        catalog: Arc<CatalogStore>,
        encoder: Arc<dyn ImageEncoder>,
        config: RankingConfig,
    ) -> RecommendResult<Self> {
        let service = Self::new(config);
        service.initialize(catalog, encoder)?;
        Ok(service)
    }

    /// Load the catalog files and ResNet weights named in `config`.
    ///
    /// # Errors
    /// Any startup error: `ConfigError`, `CatalogLoad`, `ModelLoad`,
    /// `DimensionMismatch`.
    pub fn from_config(config: &RecommenderConfig) -> RecommendResult<Self> {
        config.validate()?;
        let catalog = CatalogStore::from_config(&config.catalog)?;
        let encoder = ResNetEncoder::load(&config.encoder)?;
        Self::ready(
            Arc::new(catalog),
            Arc::new(encoder),
            config.ranking.clone(),
        )
    }

    /// Transition `Uninitialized → Ready`.
    ///
    /// On error the service stays `Uninitialized`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the encoder's output dimension differs from
    ///   the catalog dimension
    /// - `AlreadyInitialized` if the service is already `Ready`
    pub fn initialize(
        &self,
        catalog: Arc<CatalogStore>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> RecommendResult<()> {
        if self.state.get().is_some() {
            return Err(RecommendError::AlreadyInitialized);
        }
        if encoder.dimension() != catalog.dimension() {
            error!(
                "Encoder '{}' emits {}D vectors but catalog is {}D",
                encoder.model_name(),
                encoder.dimension(),
                catalog.dimension()
            );
            return Err(RecommendError::DimensionMismatch {
                expected: catalog.dimension(),
                actual: encoder.dimension(),
            });
        }

        let (size, dimension, model) = (
            catalog.size(),
            catalog.dimension(),
            encoder.model_name().to_string(),
        );
        self.state
            .set(Ready { catalog, encoder })
            .map_err(|_| RecommendError::AlreadyInitialized)?;

        info!(
            "Recommendation service ready: {} catalog entries, {}D, encoder '{}'",
            size, dimension, model
        );
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        if self.state.get().is_some() {
            ServiceState::Ready
        } else {
            ServiceState::Uninitialized
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// Loaded catalog, `None` before initialization.
    #[must_use]
    pub fn catalog(&self) -> Option<&CatalogStore> {
        self.state.get().map(|ready| ready.catalog.as_ref())
    }

    /// Encoder in use, `None` before initialization.
    #[must_use]
    pub fn encoder(&self) -> Option<&dyn ImageEncoder> {
        self.state.get().map(|ready| ready.encoder.as_ref())
    }

    /// Configured result count for callers without an explicit `k`.
    #[must_use]
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    fn ready_state(&self) -> RecommendResult<&Ready> {
        self.state.get().ok_or_else(|| {
            warn!("Recommendation requested before initialization");
            RecommendError::NotReady
        })
    }

    /// Identifiers of the `k` catalog items most similar to `image`, best first.
    ///
    /// # Errors
    /// - `NotReady` before initialization
    /// - `EmptyInput` / `Encoding` if the image cannot be encoded
    /// - `DimensionMismatch` if the encoder output drifts from the catalog
    pub fn recommend(&self, image: &[u8], k: usize) -> RecommendResult<Vec<String>> {
        Ok(into_ids(self.recommend_scored(image, k)?))
    }

    /// [`RecommendationService::recommend`] with `k` = configured default.
    pub fn recommend_default(&self, image: &[u8]) -> RecommendResult<Vec<String>> {
        self.recommend(image, self.default_k)
    }

    /// Like [`RecommendationService::recommend`], keeping scores.
    pub fn recommend_scored(&self, image: &[u8], k: usize) -> RecommendResult<Vec<RankedResult>> {
        self.recommend_filtered(image, k, |_| true)
    }

    /// Recommend, skipping the given identifiers before `k` is applied.
    ///
    /// Use this to drop the query item itself when it is in the catalog.
    pub fn recommend_excluding(
        &self,
        image: &[u8],
        k: usize,
        excluded: &[&str],
    ) -> RecommendResult<Vec<RankedResult>> {
        let excluded: HashSet<&str> = excluded.iter().copied().collect();
        self.recommend_filtered(image, k, |id| !excluded.contains(id))
    }

    fn recommend_filtered<F>(
        &self,
        image: &[u8],
        k: usize,
        keep: F,
    ) -> RecommendResult<Vec<RankedResult>>
    where
        F: Fn(&str) -> bool + Sync,
    {
        let ready = self.ready_state()?;

        let query = ready.encoder.encode(image)?;
        if query.dimension() != ready.catalog.dimension() {
            warn!(
                "Encoder output {}D does not match catalog {}D",
                query.dimension(),
                ready.catalog.dimension()
            );
            return Err(RecommendError::DimensionMismatch {
                expected: ready.catalog.dimension(),
                actual: query.dimension(),
            });
        }

        debug!(k, image_bytes = image.len(), "Recommending");
        self.ranker.top_k_filtered(
            query.as_slice(),
            ready.catalog.entries(),
            k,
            |entry| keep(entry.id()),
        )
    }

    /// Rank the catalog against a precomputed query vector.
    ///
    /// # Errors
    /// - `NotReady` before initialization
    /// - `DimensionMismatch` if `query.len()` differs from the catalog dimension
    /// - `InvalidValue` for non-finite components
    pub fn top_k(&self, query: &[f32], k: usize) -> RecommendResult<Vec<RankedResult>> {
        let ready = self.ready_state()?;
        self.ranker.top_k(query, ready.catalog.entries(), k)
    }

    /// Items most similar to the catalog item `id`, excluding the item itself.
    ///
    /// # Errors
    /// - `NotReady` before initialization
    /// - `UnknownIdentifier` if `id` is not in the catalog
    pub fn similar_to(&self, id: &str, k: usize) -> RecommendResult<Vec<RankedResult>> {
        let ready = self.ready_state()?;
        let entry = ready
            .catalog
            .get(id)
            .ok_or_else(|| RecommendError::UnknownIdentifier { id: id.to_string() })?;

        self.ranker.top_k_filtered(
            entry.vector().as_slice(),
            ready.catalog.entries(),
            k,
            |candidate| candidate.id() != id,
        )
    }

    /// Run [`RecommendationService::recommend_excluding`] on the blocking
    /// pool, giving up after `timeout`.
    ///
    /// The encode keeps running to completion in the background after a
    /// timeout; only the caller stops waiting.
    ///
    /// # Errors
    /// - `Timeout` when `timeout` elapses first
    /// - any error of [`RecommendationService::recommend`]
    pub async fn recommend_within(
        self: Arc<Self>,
        image: Vec<u8>,
        k: usize,
        excluded: Vec<String>,
        timeout: Duration,
    ) -> RecommendResult<Vec<RankedResult>> {
        let task = tokio::task::spawn_blocking(move || {
            let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();
            self.recommend_excluding(&image, k, &excluded)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!("Recommendation task failed: {}", join_error);
                Err(RecommendError::encoding(format!(
                    "recommendation task failed: {}",
                    join_error
                )))
            }
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "Recommendation timed out");
                Err(RecommendError::Timeout { timeout_ms })
            }
        }
    }
}

fn into_ids(results: Vec<RankedResult>) -> Vec<String> {
    results.into_iter().map(|r| r.id).collect()
}

impl fmt::Debug for RecommendationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendationService")
            .field("state", &self.state())
            .field("catalog_size", &self.catalog().map(CatalogStore::size))
            .field("default_k", &self.default_k)
            .finish()
    }
}

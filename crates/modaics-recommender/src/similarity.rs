//! Cosine similarity and exact top-K ranking over the catalog.
//!
//! Every query is a full linear scan: each entry is scored, the scores are
//! stably sorted descending, and the first `k` are kept. Entries with equal
//! scores therefore come out in catalog load order.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{RecommendError, RecommendResult};
use crate::types::{l2_norm, validate_finite, CatalogEntry, RankedResult};

/// Added to the norm product so all-zero vectors score 0 instead of NaN.
pub const COSINE_EPSILON: f64 = 1e-8;

/// Cosine similarity `dot(a, b) / (|a| * |b| + eps)`.
///
/// Accumulates in f64. Callers must pass equal-length slices; the ranker
/// checks this before scoring.
///
/// # Performance
/// O(n) where n is the embedding dimension (2048 for ResNet-50).
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine_similarity on unequal lengths");

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON)) as f32
}

/// Score against a catalog entry whose norm was computed at load time.
#[inline]
fn score_entry(query: &[f32], query_norm: f64, entry: &CatalogEntry) -> f32 {
    let dot: f64 = query
        .iter()
        .zip(entry.vector().as_slice())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    (dot / (query_norm * entry.norm() + COSINE_EPSILON)) as f32
}

/// Descending by score; `Equal` on ties so a stable sort keeps load order.
fn by_score_descending(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.score.total_cmp(&a.score)
}

/// Stable sort by score descending, then keep the first `k`.
pub fn select_top_k(mut scored: Vec<RankedResult>, k: usize) -> Vec<RankedResult> {
    if k == 0 {
        return Vec::new();
    }
    scored.sort_by(by_score_descending);
    scored.truncate(k);
    scored
}

/// Brute-force ranker over borrowed catalog entries.
///
/// Holds no catalog state; it borrows entries per call and never mutates
/// them. Scoring runs on the rayon pool once the candidate count reaches
/// `parallel_threshold`. Parallel and sequential scoring yield the same
/// ordered scores.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    parallel_threshold: usize,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl SimilarityRanker {
    #[must_use]
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Top `k` catalog entries by cosine similarity to `query`.
    ///
    /// Returns `min(k, entries.len())` results; `k == 0` yields an empty
    /// vector. The query's own catalog item, if any, is not excluded.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `query.len()` differs from the entry dimension
    /// - `InvalidValue` if the query has a NaN or infinite component
    pub fn top_k(
        &self,
        query: &[f32],
        entries: &[CatalogEntry],
        k: usize,
    ) -> RecommendResult<Vec<RankedResult>> {
        self.top_k_filtered(query, entries, k, |_| true)
    }

    /// Like [`SimilarityRanker::top_k`], skipping entries for which `keep`
    /// returns false before `k` is applied.
    pub fn top_k_filtered<F>(
        &self,
        query: &[f32],
        entries: &[CatalogEntry],
        k: usize,
        keep: F,
    ) -> RecommendResult<Vec<RankedResult>>
    where
        F: Fn(&CatalogEntry) -> bool + Sync,
    {
        Self::check_query(query, entries)?;
        if k == 0 || entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let score = |entry: &CatalogEntry| {
            keep(entry).then(|| RankedResult::new(score_entry(query, query_norm, entry), entry.id()))
        };

        let scored: Vec<RankedResult> = if entries.len() >= self.parallel_threshold {
            entries.par_iter().filter_map(score).collect()
        } else {
            entries.iter().filter_map(score).collect()
        };

        let candidates = scored.len();
        let results = select_top_k(scored, k);
        debug!(
            candidates,
            returned = results.len(),
            top_score = results.first().map(|r| r.score),
            "Ranked catalog"
        );
        Ok(results)
    }

    fn check_query(query: &[f32], entries: &[CatalogEntry]) -> RecommendResult<()> {
        if let Some(first) = entries.first() {
            let expected = first.vector().dimension();
            if query.len() != expected {
                return Err(RecommendError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        validate_finite(query)
    }
}

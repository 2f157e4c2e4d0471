//! Error types for recommendation operations.
//!
//! # Error Categories
//!
//! | Category | Variants | When |
//! |----------|----------|------|
//! | Startup | CatalogLoad, ModelLoad, ConfigError, AlreadyInitialized | Service never reaches `Ready` |
//! | Per-request | Encoding, EmptyInput, DimensionMismatch, InvalidValue, NotReady, UnknownIdentifier, Timeout | Returned to the caller |
//! | Infrastructure | IoError | Either |
//!
//! Nothing in this crate retries. Transient failures surface once.

use std::path::PathBuf;

use thiserror::Error;

/// Recommendation-specific errors.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Catalog data failed to decode or validate.
    #[error("Failed to load catalog: {message}")]
    CatalogLoad { message: String },

    /// Encoder weights missing or unloadable.
    #[error("Failed to load encoder model from {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// `initialize` called on a service that is already `Ready`.
    #[error("Recommendation service is already initialized")]
    AlreadyInitialized,

    /// Image could not be turned into a feature vector.
    #[error("Failed to encode image: {message}")]
    Encoding { message: String },

    /// Zero-length image input.
    #[error("Empty image input")]
    EmptyInput,

    /// Vector length disagrees with the catalog dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Non-finite component in a query vector.
    #[error("Invalid value at index {index}: {value}")]
    InvalidValue { index: usize, value: f32 },

    /// Query issued before the service reached `Ready`.
    #[error("Recommendation service is not ready")]
    NotReady,

    /// Identifier not present in the catalog.
    #[error("Unknown catalog identifier: {id}")]
    UnknownIdentifier { id: String },

    /// Caller deadline elapsed.
    #[error("Recommendation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RecommendError {
    /// True for errors that abort startup rather than fail a single request.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::CatalogLoad { .. }
                | Self::ModelLoad { .. }
                | Self::ConfigError { .. }
                | Self::AlreadyInitialized
        )
    }

    pub(crate) fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogLoad {
            message: message.into(),
        }
    }

    pub(crate) fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }
}

/// Result type for recommendation operations.
pub type RecommendResult<T> = Result<T, RecommendError>;

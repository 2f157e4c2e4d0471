//! Root configuration for the recommender.
//!
//! # TOML Structure
//!
//! ```toml
//! [catalog]
//! vectors_path = "./assets/Embeddings.json"
//! identifiers_path = "./assets/Filenames.json"
//! expected_dimension = 2048
//!
//! [encoder]
//! model_path = "./models/resnet50/model.safetensors"
//! use_gpu = false
//! resize_policy = "center_crop"
//! resize_short_side = 256
//!
//! [ranking]
//! default_k = 5
//! parallel_threshold = 4096
//! ```
//!
//! Invalid config returns an error. File not found or parse error returns
//! immediately; nothing silently falls back to defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoder::{ResizePolicy, ENCODER_IMAGE_SIZE};
use crate::error::{RecommendError, RecommendResult};

// ============================================================================
// CATALOG CONFIG
// ============================================================================

/// Location and shape of the bundled catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding `[[f32]]`, one row per item.
    #[serde(default = "default_vectors_path")]
    pub vectors_path: PathBuf,

    /// JSON file holding `[String]`, parallel to `vectors_path`.
    #[serde(default = "default_identifiers_path")]
    pub identifiers_path: PathBuf,

    /// Dimension every catalog row must have. Unchecked when absent.
    #[serde(default)]
    pub expected_dimension: Option<usize>,
}

fn default_vectors_path() -> PathBuf {
    PathBuf::from("./assets/Embeddings.json")
}

fn default_identifiers_path() -> PathBuf {
    PathBuf::from("./assets/Filenames.json")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            vectors_path: default_vectors_path(),
            identifiers_path: default_identifiers_path(),
            expected_dimension: None,
        }
    }
}

impl CatalogConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `ConfigError` if either path is empty
    /// - `ConfigError` if `expected_dimension` is zero
    pub fn validate(&self) -> RecommendResult<()> {
        if self.vectors_path.as_os_str().is_empty() {
            return Err(config_error("vectors_path cannot be empty"));
        }
        if self.identifiers_path.as_os_str().is_empty() {
            return Err(config_error("identifiers_path cannot be empty"));
        }
        if self.expected_dimension == Some(0) {
            return Err(config_error("expected_dimension must be greater than 0"));
        }
        Ok(())
    }
}

// ============================================================================
// ENCODER CONFIG
// ============================================================================

/// Encoder weights and preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to `model.safetensors`, or a directory containing it.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Run inference on CUDA device 0 when available.
    #[serde(default)]
    pub use_gpu: bool,

    /// How images are brought to the 224x224 input resolution.
    #[serde(default)]
    pub resize_policy: ResizePolicy,

    /// Shorter-side length before the centre crop (`center_crop` only).
    #[serde(default = "default_resize_short_side")]
    pub resize_short_side: u32,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models/resnet50/model.safetensors")
}

fn default_resize_short_side() -> u32 {
    256
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            use_gpu: false,
            resize_policy: ResizePolicy::default(),
            resize_short_side: default_resize_short_side(),
        }
    }
}

impl EncoderConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `ConfigError` if `model_path` is empty
    /// - `ConfigError` if `resize_short_side` is smaller than the crop size
    pub fn validate(&self) -> RecommendResult<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(config_error("model_path cannot be empty"));
        }
        if self.resize_short_side < ENCODER_IMAGE_SIZE {
            return Err(config_error(format!(
                "resize_short_side ({}) must be >= crop size ({})",
                self.resize_short_side, ENCODER_IMAGE_SIZE
            )));
        }
        Ok(())
    }
}

// ============================================================================
// RANKING CONFIG
// ============================================================================

/// Ranking behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Result count used when the caller does not pass one.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Catalog size at which scoring switches to the rayon pool.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_k() -> usize {
    5
}

fn default_parallel_threshold() -> usize {
    4096
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl RankingConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `ConfigError` if `default_k` is zero
    pub fn validate(&self) -> RecommendResult<()> {
        if self.default_k == 0 {
            return Err(config_error("default_k must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

/// Root configuration for the recommender.
///
/// Load from TOML or use `Default::default()` for development.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub ranking: RankingConfig,
}

impl RecommenderConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `ConfigError` if the file cannot be read or TOML parsing fails
    pub fn from_file(path: impl AsRef<Path>) -> RecommendResult<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            config_error(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate all sections, returning the first error found.
    ///
    /// # Errors
    /// - `ConfigError` prefixed with the offending section name
    pub fn validate(&self) -> RecommendResult<()> {
        self.catalog
            .validate()
            .map_err(|e| config_error(format!("[catalog] {}", e)))?;
        self.encoder
            .validate()
            .map_err(|e| config_error(format!("[encoder] {}", e)))?;
        self.ranking
            .validate()
            .map_err(|e| config_error(format!("[ranking] {}", e)))?;
        Ok(())
    }

    /// Apply environment variable overrides. Prefix: `MODAICS_`
    ///
    /// | Variable | Config Path | Type |
    /// |----------|-------------|------|
    /// | `MODAICS_VECTORS_PATH` | `catalog.vectors_path` | path |
    /// | `MODAICS_IDENTIFIERS_PATH` | `catalog.identifiers_path` | path |
    /// | `MODAICS_MODEL_PATH` | `encoder.model_path` | path |
    /// | `MODAICS_USE_GPU` | `encoder.use_gpu` | bool |
    /// | `MODAICS_DEFAULT_K` | `ranking.default_k` | usize |
    ///
    /// Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("MODAICS_VECTORS_PATH") {
            self.catalog.vectors_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MODAICS_IDENTIFIERS_PATH") {
            self.catalog.identifiers_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MODAICS_MODEL_PATH") {
            self.encoder.model_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MODAICS_USE_GPU") {
            if let Ok(b) = val.parse::<bool>() {
                self.encoder.use_gpu = b;
            }
        }
        if let Ok(val) = env::var("MODAICS_DEFAULT_K") {
            if let Ok(n) = val.parse::<usize>() {
                self.ranking.default_k = n;
            }
        }
        self
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// - `ConfigError` if TOML parsing fails
    pub fn from_toml_str(toml: &str) -> RecommendResult<Self> {
        toml::from_str(toml).map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    /// - `ConfigError` if serialization fails
    pub fn to_toml_string(&self) -> RecommendResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| config_error(format!("Failed to serialize to TOML: {}", e)))
    }
}

fn config_error(message: impl Into<String>) -> RecommendError {
    RecommendError::ConfigError {
        message: message.into(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Env-var tests mutate process state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config_validates() {
        let config = RecommenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ranking.default_k, 5);
        assert_eq!(config.encoder.resize_short_side, 256);
        assert_eq!(config.encoder.resize_policy, ResizePolicy::CenterCrop);
        assert!(config.catalog.expected_dimension.is_none());
    }

    #[test]
    fn test_zero_default_k_fails() {
        let mut config = RecommenderConfig::default();
        config.ranking.default_k = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[ranking]"));
    }

    #[test]
    fn test_short_side_below_crop_fails() {
        let mut config = RecommenderConfig::default();
        config.encoder.resize_short_side = 200;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[encoder]"));
        assert!(err.to_string().contains("200"));
    }

    #[test]
    fn test_zero_expected_dimension_fails() {
        let mut config = RecommenderConfig::default();
        config.catalog.expected_dimension = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[catalog]"));
    }

    #[test]
    fn test_from_toml_str_partial_config() {
        let toml = r#"
            [catalog]
            vectors_path = "/data/vectors.json"
            expected_dimension = 2048

            [encoder]
            resize_policy = "stretch"
        "#;
        let config = RecommenderConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.catalog.vectors_path, PathBuf::from("/data/vectors.json"));
        assert_eq!(config.catalog.expected_dimension, Some(2048));
        assert_eq!(config.encoder.resize_policy, ResizePolicy::Stretch);
        assert_eq!(config.ranking.default_k, 5);
    }

    #[test]
    fn test_from_toml_str_invalid_fails() {
        let result = RecommenderConfig::from_toml_str("invalid { toml } content");
        assert!(result.unwrap_err().to_string().contains("TOML"));
    }

    #[test]
    fn test_serde_roundtrip_toml() {
        let mut original = RecommenderConfig::default();
        original.catalog.expected_dimension = Some(2048);
        original.ranking.default_k = 8;
        let toml_str = original.to_toml_string().unwrap();
        let restored = RecommenderConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(restored.catalog.expected_dimension, Some(2048));
        assert_eq!(restored.ranking.default_k, 8);
    }

    #[test]
    fn test_from_file_success() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ranking]").unwrap();
        writeln!(file, "default_k = 12").unwrap();

        let config = RecommenderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ranking.default_k, 12);
    }

    #[test]
    fn test_from_file_missing_returns_config_error() {
        let err = RecommenderConfig::from_file("/nonexistent/path/modaics.toml").unwrap_err();
        match err {
            RecommendError::ConfigError { message } => assert!(message.contains("nonexistent")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_from_file_empty_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = RecommenderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ranking.parallel_threshold, 4096);
    }

    #[test]
    fn test_env_override_paths_and_k() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("MODAICS_MODEL_PATH", "/custom/resnet.safetensors");
        env::set_var("MODAICS_DEFAULT_K", "9");
        let config = RecommenderConfig::default().with_env_overrides();
        env::remove_var("MODAICS_MODEL_PATH");
        env::remove_var("MODAICS_DEFAULT_K");

        assert_eq!(
            config.encoder.model_path,
            PathBuf::from("/custom/resnet.safetensors")
        );
        assert_eq!(config.ranking.default_k, 9);
    }

    #[test]
    fn test_env_override_invalid_value_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("MODAICS_USE_GPU", "not_a_bool");
        let config = RecommenderConfig::default().with_env_overrides();
        env::remove_var("MODAICS_USE_GPU");

        assert!(!config.encoder.use_gpu);
    }
}

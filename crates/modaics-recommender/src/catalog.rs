//! Immutable in-memory catalog of precomputed item embeddings.
//!
//! The catalog is built once at startup from two parallel datasets and never
//! mutated afterwards. Sharing it across threads needs no locking.
//!
//! # On-disk layout
//!
//! - `Embeddings.json`: `[[f32]]`, one row of length D per item
//! - `Filenames.json`: `[String]`, identifier for the row at the same index

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::config::CatalogConfig;
use crate::error::{RecommendError, RecommendResult};
use crate::types::{validate_finite, CatalogEntry, FeatureVector};

/// File name for the vectors half of a persisted catalog.
pub const VECTORS_FILE_NAME: &str = "Embeddings.json";

/// File name for the identifiers half of a persisted catalog.
pub const IDENTIFIERS_FILE_NAME: &str = "Filenames.json";

/// Frozen collection of `(identifier, vector)` pairs.
///
/// Iteration order is the load order. All vectors share one dimension and
/// contain only finite values; identifiers are unique.
#[derive(Debug)]
pub struct CatalogStore {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    dimension: usize,
}

impl CatalogStore {
    /// Decode a catalog from two JSON sources.
    ///
    /// # Errors
    /// `CatalogLoad` if either source fails to decode or the decoded data
    /// violates a catalog invariant (see [`CatalogStore::from_parts`]).
    pub fn load<V: Read, I: Read>(
        vectors_source: V,
        identifiers_source: I,
    ) -> RecommendResult<Self> {
        Self::load_with_dimension(vectors_source, identifiers_source, None)
    }

    /// Same as [`CatalogStore::load`], additionally requiring dimension `expected`.
    pub fn load_with_dimension<V: Read, I: Read>(
        vectors_source: V,
        identifiers_source: I,
        expected_dimension: Option<usize>,
    ) -> RecommendResult<Self> {
        let vectors: Vec<Vec<f32>> = serde_json::from_reader(vectors_source).map_err(|e| {
            error!("Catalog vectors failed to decode: {}", e);
            RecommendError::catalog(format!("vectors failed to decode: {}", e))
        })?;
        let identifiers: Vec<String> =
            serde_json::from_reader(identifiers_source).map_err(|e| {
                error!("Catalog identifiers failed to decode: {}", e);
                RecommendError::catalog(format!("identifiers failed to decode: {}", e))
            })?;

        Self::build(vectors, identifiers, expected_dimension)
    }

    /// Read the two catalog files from disk.
    ///
    /// # Errors
    /// `CatalogLoad` if a file cannot be opened or its contents are invalid.
    pub fn from_files(
        vectors_path: impl AsRef<Path>,
        identifiers_path: impl AsRef<Path>,
    ) -> RecommendResult<Self> {
        Self::open_files(vectors_path.as_ref(), identifiers_path.as_ref(), None)
    }

    /// Load the catalog described by `config`.
    pub fn from_config(config: &CatalogConfig) -> RecommendResult<Self> {
        Self::open_files(
            &config.vectors_path,
            &config.identifiers_path,
            config.expected_dimension,
        )
    }

    fn open_files(
        vectors_path: &Path,
        identifiers_path: &Path,
        expected_dimension: Option<usize>,
    ) -> RecommendResult<Self> {
        let open = |path: &Path| {
            File::open(path).map(BufReader::new).map_err(|e| {
                error!("Cannot open catalog file {}: {}", path.display(), e);
                RecommendError::catalog(format!("cannot open '{}': {}", path.display(), e))
            })
        };

        let store = Self::load_with_dimension(
            open(vectors_path)?,
            open(identifiers_path)?,
            expected_dimension,
        )?;

        info!(
            "Catalog loaded from {}: {} entries, dimension {}",
            vectors_path.display(),
            store.size(),
            store.dimension()
        );
        Ok(store)
    }

    /// Build a catalog from already-decoded parallel sequences.
    ///
    /// # Errors
    /// `CatalogLoad` when:
    /// - `vectors.len() != identifiers.len()`
    /// - the catalog is empty
    /// - any vector is empty or differs in length from the first
    /// - any component is NaN or infinite
    /// - an identifier repeats
    pub fn from_parts(vectors: Vec<Vec<f32>>, identifiers: Vec<String>) -> RecommendResult<Self> {
        Self::build(vectors, identifiers, None)
    }

    fn build(
        vectors: Vec<Vec<f32>>,
        identifiers: Vec<String>,
        expected_dimension: Option<usize>,
    ) -> RecommendResult<Self> {
        if vectors.len() != identifiers.len() {
            error!(
                "Catalog length mismatch: {} vectors, {} identifiers",
                vectors.len(),
                identifiers.len()
            );
            return Err(RecommendError::catalog(format!(
                "{} vectors but {} identifiers",
                vectors.len(),
                identifiers.len()
            )));
        }

        let dimension = match (vectors.first(), expected_dimension) {
            (None, _) => return Err(RecommendError::catalog("catalog is empty")),
            (Some(first), None) => first.len(),
            (Some(_), Some(expected)) => expected,
        };
        if dimension == 0 {
            return Err(RecommendError::catalog("catalog vectors have zero length"));
        }

        let mut entries = Vec::with_capacity(vectors.len());
        let mut index = HashMap::with_capacity(vectors.len());

        for (position, (values, id)) in vectors.into_iter().zip(identifiers).enumerate() {
            if values.len() != dimension {
                return Err(RecommendError::catalog(format!(
                    "entry {} ('{}') has dimension {}, expected {}",
                    position,
                    id,
                    values.len(),
                    dimension
                )));
            }
            if let Err(RecommendError::InvalidValue { index: at, value }) = validate_finite(&values)
            {
                return Err(RecommendError::catalog(format!(
                    "entry {} ('{}') has non-finite value {} at component {}",
                    position, id, value, at
                )));
            }
            if index.insert(id.clone(), position).is_some() {
                return Err(RecommendError::catalog(format!(
                    "duplicate identifier '{}' at entry {}",
                    id, position
                )));
            }
            entries.push(CatalogEntry::new(id, FeatureVector::new(values)));
        }

        Ok(Self {
            entries,
            index,
            dimension,
        })
    }

    /// Entries in load order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Shared vector length D.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Look up an entry by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Identifiers in load order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(CatalogEntry::id)
    }

    /// Persist as `Embeddings.json` + `Filenames.json` inside `dir`.
    ///
    /// # Errors
    /// `IoError` if the directory or files cannot be written.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> RecommendResult<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let vectors: Vec<&[f32]> = self.entries.iter().map(|e| e.vector().as_slice()).collect();
        let identifiers: Vec<&str> = self.identifiers().collect();

        write_json_file(&dir.join(VECTORS_FILE_NAME), &vectors)?;
        write_json_file(&dir.join(IDENTIFIERS_FILE_NAME), &identifiers)?;

        info!(
            "Catalog written to {}: {} entries",
            dir.display(),
            self.size()
        );
        Ok(())
    }
}

fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> RecommendResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)
        .map_err(|e| RecommendError::IoError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // LOAD TESTS
    // =========================================================================

    #[test]
    fn test_load_preserves_order() {
        let vectors = Cursor::new("[[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]]");
        let names = Cursor::new(r#"["cat", "dog", "catdog"]"#);

        let store = CatalogStore::load(vectors, names).unwrap();
        assert_eq!(store.size(), 3);
        assert_eq!(store.dimension(), 2);
        let order: Vec<&str> = store.identifiers().collect();
        assert_eq!(order, vec!["cat", "dog", "catdog"]);
        assert_eq!(store.get("dog").unwrap().vector().as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_length_mismatch_is_catalog_error() {
        let vectors = vec![vec![0.5f32; 4]; 100];
        let names: Vec<String> = (0..99).map(|i| format!("item_{i}.jpg")).collect();

        let err = CatalogStore::from_parts(vectors, names).unwrap_err();
        assert!(matches!(err, RecommendError::CatalogLoad { .. }));
        assert!(err.is_startup());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_decode_failure_is_catalog_error() {
        let err = CatalogStore::load(Cursor::new("{not json"), Cursor::new(r#"["a"]"#))
            .unwrap_err();
        assert!(matches!(err, RecommendError::CatalogLoad { .. }));

        let err = CatalogStore::load(Cursor::new("[[1.0]]"), Cursor::new("[1, 2]")).unwrap_err();
        assert!(err.to_string().contains("identifiers"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = CatalogStore::from_parts(Vec::new(), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_ragged_vectors_rejected() {
        let err = CatalogStore::from_parts(
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            ids(&["a", "b"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_expected_dimension_enforced() {
        let err = CatalogStore::load_with_dimension(
            Cursor::new("[[1.0, 0.0]]"),
            Cursor::new(r#"["a"]"#),
            Some(2048),
        )
        .unwrap_err();
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = CatalogStore::from_parts(
            vec![vec![1.0, 0.0], vec![f32::NAN, 0.0]],
            ids(&["a", "b"]),
        )
        .unwrap_err();
        assert!(matches!(err, RecommendError::CatalogLoad { .. }));
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = CatalogStore::from_parts(
            vec![vec![1.0], vec![2.0]],
            ids(&["shirt.jpg", "shirt.jpg"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    // =========================================================================
    // FILE TESTS
    // =========================================================================

    #[test]
    fn test_write_then_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            CatalogStore::from_parts(vec![vec![0.25, -1.5], vec![3.0, 0.0]], ids(&["x", "y"]))
                .unwrap();

        store.write_json(dir.path()).unwrap();
        let reloaded = CatalogStore::from_files(
            dir.path().join(VECTORS_FILE_NAME),
            dir.path().join(IDENTIFIERS_FILE_NAME),
        )
        .unwrap();

        assert_eq!(reloaded.size(), 2);
        assert_eq!(reloaded.get("x").unwrap().vector().as_slice(), &[0.25, -1.5]);
    }

    #[test]
    fn test_missing_file_is_catalog_error() {
        let err = CatalogStore::from_files("/nonexistent/Embeddings.json", "/nonexistent/F.json")
            .unwrap_err();
        assert!(matches!(err, RecommendError::CatalogLoad { .. }));
        assert!(err.to_string().contains("nonexistent"));
    }
}

//! Vector index over historical task descriptions.
//!
//! Each component gets one dense bag-of-words vector (see
//! [`crate::embedding`]). Vectors are cached on disk next to the collection
//! and reused while the cache still matches the collection:
//!
//! 1. Same cache format version.
//! 2. Same SHA-256 digest of the collection file.
//! 3. Same component count.
//! 4. Same dimensionality as a freshly computed vocabulary, for every vector.
//!
//! Any mismatch, or an unreadable cache, means the index must be rebuilt.
//!
//! # Query vectors
//!
//! A query is not embedded on its own. For every query token, each
//! component whose lower-cased description contains the token as a
//! substring contributes its own stored vector; the sum is L1-normalized.
//! Queries sharing no substring with any description embed as zero and
//! match nothing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::embedding::{self, Vocabulary};
use crate::error::IndexError;
use crate::knowledge_base::KnowledgeBase;

const CACHE_VERSION: u32 = 1;

/// Where the live vectors came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrigin {
    Cache,
    Built,
}

/// Descriptive facts about a loaded index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub dims: usize,
    pub component_count: usize,
    pub source_digest: String,
    pub built_at: DateTime<Utc>,
    pub origin: IndexOrigin,
}

#[derive(Serialize, Deserialize)]
struct VectorCache {
    version: u32,
    source_digest: String,
    dims: usize,
    component_count: usize,
    built_at: DateTime<Utc>,
    /// Base64 of little-endian `f32` bytes, one entry per component.
    vectors: Vec<String>,
}

/// Read-only vector table for one collection.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
    lowered_texts: Vec<String>,
    info: IndexInfo,
}

impl VectorIndex {
    /// Build vectors for every component.
    pub fn build(kb: &KnowledgeBase) -> Self {
        let vocabulary = vocabulary_for(kb);
        let vectors: Vec<Vec<f32>> = kb
            .components()
            .iter()
            .map(|c| vocabulary.embed(&c.task_text))
            .collect();

        info!(
            components = vectors.len(),
            dims = vocabulary.len(),
            "built component vectors"
        );

        Self::assemble(kb, vectors, vocabulary.len(), Utc::now(), IndexOrigin::Built)
    }

    /// Reuse the cache at `cache_path` when it is fresh, otherwise build and
    /// write a new one. `force_regenerate` skips the cache read.
    ///
    /// A failed cache write is logged; the built index is still returned.
    pub fn load_or_build(kb: &KnowledgeBase, cache_path: &Path, force_regenerate: bool) -> Self {
        if !force_regenerate {
            match Self::load_cache(kb, cache_path) {
                Ok(Some(index)) => return index,
                Ok(None) => debug!(path = %cache_path.display(), "no vector cache"),
                Err(e) => warn!(path = %cache_path.display(), error = %e, "vector cache unusable, rebuilding"),
            }
        }

        let index = Self::build(kb);
        if let Err(e) = index.save_cache(cache_path) {
            warn!(path = %cache_path.display(), error = %e, "failed to write vector cache");
        }
        index
    }

    /// Load a fresh cache. `Ok(None)` when no cache file exists.
    pub fn load_cache(kb: &KnowledgeBase, cache_path: &Path) -> Result<Option<Self>, IndexError> {
        if !cache_path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(cache_path)?;
        let cache: VectorCache = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::CacheCorrupt(e.to_string()))?;

        if cache.version != CACHE_VERSION {
            return Err(IndexError::CacheCorrupt(format!(
                "unsupported cache version {}",
                cache.version
            )));
        }
        if cache.source_digest != kb.source_digest() {
            return Err(IndexError::CacheCorrupt(
                "cache was built from a different collection".to_string(),
            ));
        }
        if cache.component_count != kb.len() || cache.vectors.len() != kb.len() {
            return Err(IndexError::CacheCorrupt(format!(
                "cache holds {} vectors for {} components",
                cache.vectors.len(),
                kb.len()
            )));
        }

        let expected = vocabulary_for(kb).len();
        if cache.dims != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: cache.dims,
            });
        }

        let mut vectors = Vec::with_capacity(cache.vectors.len());
        for encoded in &cache.vectors {
            let blob = BASE64
                .decode(encoded)
                .map_err(|e| IndexError::CacheCorrupt(e.to_string()))?;
            let vector = embedding::blob_to_vec(&blob);
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            vectors.push(vector);
        }

        info!(
            path = %cache_path.display(),
            components = vectors.len(),
            dims = expected,
            "loaded vector cache"
        );

        Ok(Some(Self::assemble(
            kb,
            vectors,
            expected,
            cache.built_at,
            IndexOrigin::Cache,
        )))
    }

    /// Write the vector table to `cache_path`, creating parent directories.
    pub fn save_cache(&self, cache_path: &Path) -> Result<(), IndexError> {
        let cache = VectorCache {
            version: CACHE_VERSION,
            source_digest: self.info.source_digest.clone(),
            dims: self.info.dims,
            component_count: self.info.component_count,
            built_at: self.info.built_at,
            vectors: self
                .vectors
                .iter()
                .map(|v| BASE64.encode(embedding::vec_to_blob(v)))
                .collect(),
        };

        if let Some(parent) = cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(cache_path, serde_json::to_vec(&cache)?)?;
        info!(path = %cache_path.display(), "wrote vector cache");
        Ok(())
    }

    fn assemble(
        kb: &KnowledgeBase,
        vectors: Vec<Vec<f32>>,
        dims: usize,
        built_at: DateTime<Utc>,
        origin: IndexOrigin,
    ) -> Self {
        Self {
            lowered_texts: kb
                .components()
                .iter()
                .map(|c| c.task_text.to_lowercase())
                .collect(),
            info: IndexInfo {
                dims,
                component_count: vectors.len(),
                source_digest: kb.source_digest().to_string(),
                built_at,
                origin,
            },
            vectors,
        }
    }

    /// False when there are no vectors to compare against.
    pub fn is_available(&self) -> bool {
        !self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.info.dims
    }

    pub fn info(&self) -> &IndexInfo {
        &self.info
    }

    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        self.vectors.get(index).map(Vec::as_slice)
    }

    /// Substring-weighted composite of stored vectors for `query`.
    pub fn embed_query(&self, query: &str) -> Vec<f64> {
        let mut weights = vec![0u32; self.vectors.len()];
        for token in embedding::tokenize(query) {
            for (i, text) in self.lowered_texts.iter().enumerate() {
                if text.contains(token.as_str()) {
                    weights[i] += 1;
                }
            }
        }

        let mut query_vec = vec![0.0f64; self.info.dims];
        for (vector, &weight) in self.vectors.iter().zip(weights.iter()) {
            if weight == 0 {
                continue;
            }
            let w = f64::from(weight);
            for (q, &v) in query_vec.iter_mut().zip(vector.iter()) {
                *q += w * f64::from(v);
            }
        }

        embedding::l1_normalize(&mut query_vec);
        query_vec
    }

    /// Cosine similarity of `query` to every component, in collection order.
    /// `None` when the index is unavailable.
    pub fn similarities(&self, query: &str) -> Option<Vec<f64>> {
        if !self.is_available() {
            return None;
        }
        let query_vec = self.embed_query(query);
        Some(
            self.vectors
                .iter()
                .map(|v| embedding::cosine_similarity(&query_vec, v))
                .collect(),
        )
    }
}

fn vocabulary_for(kb: &KnowledgeBase) -> Vocabulary {
    Vocabulary::build(kb.components().iter().map(|c| c.task_text.as_str()))
}

//! Deterministic in-memory embedder for tests — no network. Produces a
//! fixed-dimension vector derived from a stable hash of the input text, so
//! repeated calls with the same text return the same vector (useful for
//! idempotence tests upstream).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use indexmesh_common::IndexMeshError;

use crate::TextEmbedder;

pub struct MockEmbedder {
    dimension: usize,
    max_batch_size: usize,
    /// When set, the next call returns this error instead of a vector.
    pub inject_error: AtomicBool,
    pub injected_dimension_override: Option<usize>,
    /// Substring match: any text containing this gets a vector one short of
    /// `dimension`, simulating a provider that quietly truncates a single
    /// item's embedding without failing the batch outright.
    bad_vector_substring: Option<String>,
    /// Substring match: any text containing this makes `embed_batch`/
    /// `embed_one` return `DimensionMismatch` directly, mirroring
    /// `EmbeddingClient::check_dimensions` rejecting the whole call rather
    /// than silently handing back a malformed vector.
    dimension_error_substring: Option<String>,
}

impl MockEmbedder {
    pub fn new(dimension: usize, max_batch_size: usize) -> Self {
        Self {
            dimension,
            max_batch_size,
            inject_error: AtomicBool::new(false),
            injected_dimension_override: None,
            bad_vector_substring: None,
            dimension_error_substring: None,
        }
    }

    pub fn with_dimension_override(mut self, dim: usize) -> Self {
        self.injected_dimension_override = Some(dim);
        self
    }

    pub fn with_bad_vector_for(mut self, substring: impl Into<String>) -> Self {
        self.bad_vector_substring = Some(substring.into());
        self
    }

    pub fn with_dimension_error_for(mut self, substring: impl Into<String>) -> Self {
        self.dimension_error_substring = Some(substring.into());
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut dim = self.injected_dimension_override.unwrap_or(self.dimension);
        if let Some(needle) = &self.bad_vector_substring {
            if text.contains(needle.as_str()) {
                dim = dim.saturating_sub(1);
            }
        }
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..dim)
            .map(|i| (((seed.wrapping_add(i as u64)) % 1000) as f32) / 1000.0)
            .collect()
    }
}

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, IndexMeshError> {
        if self.inject_error.swap(false, Ordering::SeqCst) {
            return Err(IndexMeshError::Transient("injected mock failure".to_string()));
        }
        if let Some(needle) = &self.dimension_error_substring {
            if text.contains(needle.as_str()) {
                return Err(IndexMeshError::DimensionMismatch {
                    expected: self.dimension,
                    actual: self.dimension.saturating_sub(1),
                });
            }
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexMeshError> {
        if self.inject_error.swap(false, Ordering::SeqCst) {
            return Err(IndexMeshError::Transient("injected mock failure".to_string()));
        }
        if let Some(needle) = &self.dimension_error_substring {
            if texts.iter().any(|t| t.contains(needle.as_str())) {
                return Err(IndexMeshError::DimensionMismatch {
                    expected: self.dimension,
                    actual: self.dimension.saturating_sub(1),
                });
            }
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

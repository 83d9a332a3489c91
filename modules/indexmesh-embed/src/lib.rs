//! Embedding client (C2, §4.2): batched text→vector via the configured
//! provider, with sub-batch pacing, 429-reset handling, and a hard
//! dimension contract. Grounded on `rootsignal-scout`'s `Embedder`, which
//! wraps the same `ai-client` OpenAI-compatible surface against Voyage AI's
//! embeddings endpoint.

pub mod mock;

pub use mock::MockEmbedder;

use std::time::Duration;

use ai_client::openai::OpenAi;
use ai_client::traits::EmbedAgent;
use async_trait::async_trait;
use indexmesh_common::IndexMeshError;
use tracing::{debug, warn};

/// Minimum pause enforced between sub-batches (§4.2: "pauses ≥ 1s").
const MIN_INTER_BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Minimum wait on a 429 when the provider doesn't specify a reset time.
const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Crude token estimate (4 chars/token) used for request-sizing decisions
/// upstream; not billed against, just a planning heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, IndexMeshError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexMeshError>;
    fn dimension(&self) -> usize;
    fn max_batch_size(&self) -> usize;
}

/// Wraps the OpenAI-compatible embeddings endpoint, split into sub-batches
/// of `max_batch_size` with inter-batch pacing and bounded retries.
pub struct EmbeddingClient {
    client: OpenAi,
    dimension: usize,
    max_batch_size: usize,
    max_retries: u32,
}

impl EmbeddingClient {
    pub fn new(api_key: &str, model: &str, base_url: &str, dimension: usize, max_batch_size: usize) -> Self {
        let client = OpenAi::new(api_key, model)
            .with_base_url(base_url)
            .with_embedding_model(model);
        Self {
            client,
            dimension,
            max_batch_size,
            max_retries: 3,
        }
    }

    async fn embed_batch_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexMeshError> {
        self.client
            .embed_batch(texts.to_vec())
            .await
            .map_err(classify_provider_error)
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<(), IndexMeshError> {
        for v in vectors {
            if v.len() != self.dimension {
                return Err(IndexMeshError::DimensionMismatch {
                    expected: self.dimension,
                    actual: v.len(),
                });
            }
        }
        Ok(())
    }
}

fn classify_provider_error(err: anyhow::Error) -> IndexMeshError {
    let msg = err.to_string();
    if msg.contains("429") {
        IndexMeshError::RateLimited {
            reset_after_secs: MIN_RATE_LIMIT_WAIT.as_secs(),
        }
    } else if msg.contains("timed out") || msg.contains("timeout") {
        IndexMeshError::Timeout(msg)
    } else if msg.contains("401") || msg.contains("403") {
        IndexMeshError::Unauthorized(msg)
    } else if msg.contains("500") || msg.contains("502") || msg.contains("503") {
        IndexMeshError::Transient(msg)
    } else {
        IndexMeshError::Fatal(msg)
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingClient {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, IndexMeshError> {
        let mut attempt = 0;
        loop {
            match self.client.embed(text.to_string()).await {
                Ok(vector) => {
                    self.check_dimensions(std::slice::from_ref(&vector))?;
                    return Ok(vector);
                }
                Err(e) => {
                    let classified = classify_provider_error(e);
                    attempt += 1;
                    if !classified.is_retryable() || attempt >= self.max_retries {
                        return Err(classified);
                    }
                    if let IndexMeshError::RateLimited { reset_after_secs } = &classified {
                        tokio::time::sleep(Duration::from_secs((*reset_after_secs).max(1))).await;
                    } else {
                        tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                    }
                }
            }
        }
    }

    /// Splits `texts` into sub-batches of `max_batch_size`, pausing between
    /// each. A provider-level dimension mismatch on any returned vector
    /// fails that sub-batch's call with `DimensionMismatch` (not handled
    /// per-item here); the indexer core (C6) treats that as recoverable
    /// and falls back to single-item mode, it never aborts the run.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexMeshError> {
        let mut results = Vec::with_capacity(texts.len());

        for (chunk_idx, chunk) in texts.chunks(self.max_batch_size).enumerate() {
            if chunk_idx > 0 {
                tokio::time::sleep(MIN_INTER_BATCH_PAUSE).await;
            }

            let mut attempt = 0;
            loop {
                match self.embed_batch_once(chunk).await {
                    Ok(vectors) => {
                        self.check_dimensions(&vectors)?;
                        results.extend(vectors);
                        break;
                    }
                    Err(e) => {
                        attempt += 1;
                        if !e.is_retryable() || attempt >= self.max_retries {
                            warn!(chunk = chunk_idx, error = %e, "Embedding sub-batch failed");
                            return Err(e);
                        }
                        if let IndexMeshError::RateLimited { reset_after_secs } = &e {
                            debug!(wait_secs = reset_after_secs, "Rate limited, waiting before retry");
                            tokio::time::sleep(Duration::from_secs((*reset_after_secs).max(1))).await;
                        } else {
                            tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                        }
                    }
                }
            }
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_at_least_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens(&"a".repeat(40)), 10);
    }

    #[test]
    fn classifies_rate_limit_errors() {
        let err = classify_provider_error(anyhow::anyhow!("OpenAI embedding error (429): rate limited"));
        assert!(matches!(err, IndexMeshError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_auth_errors_as_non_retryable() {
        let err = classify_provider_error(anyhow::anyhow!("OpenAI embedding error (401): bad key"));
        assert!(matches!(err, IndexMeshError::Unauthorized(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classifies_server_errors_as_transient() {
        let err = classify_provider_error(anyhow::anyhow!("OpenAI embedding error (503): overloaded"));
        assert!(matches!(err, IndexMeshError::Transient(_)));
        assert!(err.is_retryable());
    }
}

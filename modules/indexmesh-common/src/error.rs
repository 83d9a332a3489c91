use thiserror::Error;

/// Behavioral error taxonomy for the indexing engine (see spec §7, §4.12).
///
/// Variants distinguish propagation classes, not just error sources: the
/// indexer core (C6) classifies every error that escapes an adapter, the
/// embedding client, or the vector store gateway into one of these before
/// deciding whether to fail the run, abort one account, or just log and move
/// on.
#[derive(Error, Debug)]
pub enum IndexMeshError {
    /// Call exceeded its per-call timeout. Retryable.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Source or provider signaled a rate limit. Not an error for stats
    /// purposes — surfaced as `rateLimited=true` on the run report.
    #[error("rate limited: retry after {reset_after_secs}s")]
    RateLimited { reset_after_secs: u64 },

    /// Authentication failed against a source or provider.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Requested resource does not exist (e.g. an account handle).
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient transport/network failure, distinct from a hard timeout.
    #[error("transient error: {0}")]
    Transient(String),

    /// Configuration is invalid or incomplete; caught at load time, never at
    /// runtime as a surprise.
    #[error("configuration error: {0}")]
    Config(String),

    /// The embedding provider returned a vector whose dimension does not
    /// match the collection contract. Recoverable, not fatal: it's what
    /// drives the bulk→single-item fallback in the indexer core (§4.6
    /// Scenario 4) rather than aborting the run.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store schema/validation error (dimension, distance metric,
    /// or a malformed point). Non-retryable.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Anything else that should fail the whole run: repeated auth
    /// failure, collection-ensure-impossible, unrecoverable config.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IndexMeshError {
    /// Whether this error should fail the entire run (vs. being scoped to
    /// one account, one chunk, or one item). See spec §7. A dimension
    /// mismatch is deliberately excluded here: it's scoped to the batch or
    /// item that produced it, and the indexer core handles it by falling
    /// back to single-item mode rather than aborting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexMeshError::Fatal(_))
    }

    /// Whether this error represents a rate-limit signal rather than a
    /// failure (no `consecutiveFailures` bump, per §4.7).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, IndexMeshError::RateLimited { .. })
    }

    /// Whether the underlying condition is worth retrying with backoff
    /// (transport hiccups, timeouts, 5xx/429 from the vector store).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexMeshError::Timeout(_) | IndexMeshError::Transient(_) | IndexMeshError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexMeshError>;

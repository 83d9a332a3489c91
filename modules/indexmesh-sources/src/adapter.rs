//! The shared `SourceAdapter` seam (C3, §4.3): mirrors the teacher's
//! `ContentFetcher` trait, which exists specifically so indexing logic can
//! be driven by an in-memory mock instead of live network calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmesh_common::{IndexMeshError, Source};

/// One raw record as returned by a provider, before normalization (C4).
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub foreign_id: String,
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// `"<channel>:topic:<topicId>"` for groupchat topic messages, the
    /// bare handle otherwise (§4.3) — carried through so C4 can derive the
    /// partition key without re-parsing adapter internals.
    pub partition_handle: String,
    pub raw: serde_json::Value,
}

/// Result of one `fetch_forward`/`fetch_backward` call.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub requests_used: u32,
    /// True if the provider signaled there may be more data beyond what
    /// was returned (budget exhausted, or a real next-page token still
    /// pending) — distinct from "adapter doesn't support this direction".
    pub has_more_data: bool,
    pub rate_limited: bool,
}

/// Given `(handle, boundary?)` returns a finite, budget-bounded page of raw
/// records with monotonic pagination, plus the request count so C6 can bill
/// the global budget. Both directions share this one contract; an adapter
/// that cannot support a direction (§9: the microblog adapter has no
/// "before earliest" mode) reports `has_more_data=false` unconditionally
/// rather than silently returning nothing.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Newest-first pull of records with `created_at > since` (or all
    /// records if `since` is `None`), bounded by `budget` requests.
    async fn fetch_forward(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError>;

    /// Oldest-direction pull of records with `created_at < before`, bounded
    /// by `budget` requests.
    async fn fetch_backward(
        &self,
        handle: &str,
        before: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError>;
}

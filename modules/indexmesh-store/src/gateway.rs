use async_trait::async_trait;
use indexmesh_common::IndexMeshError;
use uuid::Uuid;

use crate::collection::CollectionSpec;

/// One stored point as seen by the gateway: opaque payload (JSON) plus the
/// raw vector. The gateway does not know about `CanonicalMessage` — that
/// coupling lives in the indexer core (C6), which builds this from a
/// `StoredPoint` (§4.1).
#[derive(Debug, Clone)]
pub struct GatewayPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// A retrieved point, with its payload parsed back out.
#[derive(Debug, Clone)]
pub struct RetrievedPoint {
    pub id: Uuid,
    pub vector: Option<Vec<f32>>,
    pub payload: serde_json::Value,
    pub score: Option<f32>,
}

/// Equality filter over one payload field — the only filter shape the
/// boundary index (C5) needs (`authorHandle == lower(handle)`, §4.5).
#[derive(Debug, Clone)]
pub struct FieldEq {
    pub field: String,
    pub value: String,
}

/// Parameters for [`VectorStoreGateway::search_filtered`] (§4.1). When
/// `vector` is `None`, callers are expected to have supplied the
/// zero-vector convention upstream (`score_threshold = 0`) to mean a
/// filter-only scan — the gateway does not special-case this; it passes
/// whatever vector it's given straight to the provider.
pub struct SearchParams {
    pub vector: Option<Vec<f32>>,
    pub filter: Option<FieldEq>,
    pub limit: u64,
    pub with_payload: bool,
    pub with_vector: bool,
    pub score_threshold: f32,
}

/// Result of a batch upsert: how many points were stored, and any
/// per-point errors keyed by index into the submitted batch (§4.1).
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub stored_count: usize,
    pub errors: Vec<(usize, String)>,
}

/// Thin typed interface over the vector database (C1, §4.1). Implemented
/// against Qdrant in production; an in-memory fake satisfies the same
/// trait for deterministic tests (no network, no Docker).
#[async_trait]
pub trait VectorStoreGateway: Send + Sync {
    /// Idempotent. Creates the collection if absent with exactly `spec`;
    /// if present, validates `dim`/`distance` match and fails on
    /// mismatch — never silently reconfigures.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexMeshError>;

    /// Atomic per call. At-least-once: callers must tolerate duplicates
    /// being re-upserted (same id overwrites).
    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<GatewayPoint>,
    ) -> Result<UpsertOutcome, IndexMeshError>;

    async fn get_point(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<RetrievedPoint>, IndexMeshError>;

    async fn delete_by_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize, IndexMeshError>;

    async fn search_filtered(
        &self,
        collection: &str,
        params: SearchParams,
    ) -> Result<Vec<RetrievedPoint>, IndexMeshError>;
}

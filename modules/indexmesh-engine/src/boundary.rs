//! Boundary index (C5, §4.5): derives `{earliest, latest, hasData}` for a
//! handle via a filter-only, zero-vector search against the vector store.
//! Never cached authoritatively — the vector store stays ground truth.

use chrono::{DateTime, Utc};
use indexmesh_common::{Boundary, IndexMeshError};
use indexmesh_store::{FieldEq, SearchParams, VectorStoreGateway};

/// Large enough to see the full tail of a handle's history in one scan
/// without paging (§4.5: "limit = K (K≥1000)").
const BOUNDARY_SCAN_LIMIT: u64 = 1000;

pub struct BoundaryIndex<'a> {
    gateway: &'a dyn VectorStoreGateway,
    collection: String,
}

impl<'a> BoundaryIndex<'a> {
    pub fn new(gateway: &'a dyn VectorStoreGateway, collection: impl Into<String>) -> Self {
        Self {
            gateway,
            collection: collection.into(),
        }
    }

    /// Looks up `{earliest, latest}` for `handle`. If the lower-cased query
    /// returns nothing and the original-case handle differs, retries with
    /// the original case — a legacy fallback to stay readable against
    /// pre-normalization data (§4.5).
    pub async fn boundaries(&self, handle: &str) -> Result<Boundary, IndexMeshError> {
        let lower = handle.to_lowercase();
        let boundary = self.scan(&lower).await?;
        if boundary.has_data || lower == handle {
            return Ok(boundary);
        }
        self.scan(handle).await
    }

    async fn scan(&self, handle: &str) -> Result<Boundary, IndexMeshError> {
        let results = self
            .gateway
            .search_filtered(
                &self.collection,
                SearchParams {
                    vector: None,
                    filter: Some(FieldEq {
                        field: "authorHandle".to_string(),
                        value: handle.to_string(),
                    }),
                    limit: BOUNDARY_SCAN_LIMIT,
                    with_payload: true,
                    with_vector: false,
                    score_threshold: 0.0,
                },
            )
            .await?;

        if results.is_empty() {
            return Ok(Boundary::empty());
        }

        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;
        for point in &results {
            if let Some(created_at) = point
                .payload
                .get("createdAt")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
            {
                earliest = Some(earliest.map_or(created_at, |e: DateTime<Utc>| e.min(created_at)));
                latest = Some(latest.map_or(created_at, |l: DateTime<Utc>| l.max(created_at)));
            }
        }

        Ok(Boundary {
            earliest,
            latest,
            has_data: earliest.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmesh_store::{CollectionSpec, GatewayPoint, InMemoryGateway};
    use uuid::Uuid;

    #[tokio::test]
    async fn empty_collection_has_no_data() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&CollectionSpec::new("c", 3)).await.unwrap();
        let idx = BoundaryIndex::new(&gw, "c");
        let b = idx.boundaries("alice").await.unwrap();
        assert!(!b.has_data);
    }

    #[tokio::test]
    async fn finds_min_max_created_at_for_handle() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&CollectionSpec::new("c", 3)).await.unwrap();

        let early = Utc::now() - chrono::Duration::days(10);
        let late = Utc::now();
        gw.upsert_batch(
            "c",
            vec![
                GatewayPoint {
                    id: Uuid::new_v4(),
                    vector: vec![1.0, 0.0, 0.0],
                    payload: serde_json::json!({"authorHandle": "alice", "createdAt": early.to_rfc3339()}),
                },
                GatewayPoint {
                    id: Uuid::new_v4(),
                    vector: vec![0.0, 1.0, 0.0],
                    payload: serde_json::json!({"authorHandle": "alice", "createdAt": late.to_rfc3339()}),
                },
            ],
        )
        .await
        .unwrap();

        let idx = BoundaryIndex::new(&gw, "c");
        let b = idx.boundaries("alice").await.unwrap();
        assert!(b.has_data);
        assert_eq!(b.earliest.unwrap().timestamp(), early.timestamp());
        assert_eq!(b.latest.unwrap().timestamp(), late.timestamp());
    }
}

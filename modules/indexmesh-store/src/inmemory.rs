//! In-memory fake of [`VectorStoreGateway`] — no network, no database, no
//! Docker. Mirrors the teacher's MockFetcher/MockSignalStore rationale:
//! property and scenario tests drive the real indexer logic against this
//! instead of a live Qdrant instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmesh_common::IndexMeshError;
use uuid::Uuid;

use crate::collection::CollectionSpec;
use crate::gateway::{GatewayPoint, RetrievedPoint, SearchParams, UpsertOutcome, VectorStoreGateway};

#[derive(Debug, Clone)]
struct StoredEntry {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

#[derive(Default)]
pub struct InMemoryGateway {
    collections: Mutex<HashMap<String, CollectionSpec>>,
    points: Mutex<HashMap<String, HashMap<Uuid, StoredEntry>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_count(&self, collection: &str) -> usize {
        self.points
            .lock()
            .unwrap()
            .get(collection)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStoreGateway for InMemoryGateway {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexMeshError> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(existing) = collections.get(&spec.name) {
            if existing.dim != spec.dim || existing.distance != spec.distance {
                return Err(IndexMeshError::Fatal(format!(
                    "collection {} exists with incompatible spec",
                    spec.name
                )));
            }
            return Ok(());
        }
        collections.insert(spec.name.clone(), spec.clone());
        self.points
            .lock()
            .unwrap()
            .entry(spec.name.clone())
            .or_default();
        Ok(())
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<GatewayPoint>,
    ) -> Result<UpsertOutcome, IndexMeshError> {
        let spec_dim = self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|s| s.dim);

        let mut outcome = UpsertOutcome::default();
        let mut store = self.points.lock().unwrap();
        let entries = store.entry(collection.to_string()).or_default();

        for (idx, p) in points.into_iter().enumerate() {
            if let Some(dim) = spec_dim {
                if p.vector.len() != dim {
                    outcome.errors.push((
                        idx,
                        format!("dimension mismatch: expected {dim}, got {}", p.vector.len()),
                    ));
                    continue;
                }
            }
            entries.insert(
                p.id,
                StoredEntry {
                    vector: p.vector,
                    payload: p.payload,
                },
            );
            outcome.stored_count += 1;
        }

        Ok(outcome)
    }

    async fn get_point(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<RetrievedPoint>, IndexMeshError> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|m| m.get(&id))
            .map(|e| RetrievedPoint {
                id,
                vector: Some(e.vector.clone()),
                payload: e.payload.clone(),
                score: None,
            }))
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize, IndexMeshError> {
        let mut store = self.points.lock().unwrap();
        let Some(entries) = store.get_mut(collection) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in ids {
            if entries.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn search_filtered(
        &self,
        collection: &str,
        params: SearchParams,
    ) -> Result<Vec<RetrievedPoint>, IndexMeshError> {
        let store = self.points.lock().unwrap();
        let Some(entries) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<RetrievedPoint> = entries
            .iter()
            .filter(|(_, e)| match &params.filter {
                Some(f) => e
                    .payload
                    .get(&f.field)
                    .and_then(|v| v.as_str())
                    .map(|s| s == f.value)
                    .unwrap_or(false),
                None => true,
            })
            .map(|(id, e)| {
                let score = params
                    .vector
                    .as_ref()
                    .map(|v| cosine_similarity(v, &e.vector))
                    .unwrap_or(1.0);
                RetrievedPoint {
                    id: *id,
                    vector: params.with_vector.then(|| e.vector.clone()),
                    payload: if params.with_payload {
                        e.payload.clone()
                    } else {
                        serde_json::Value::Null
                    },
                    score: Some(score),
                }
            })
            .filter(|p| p.score.unwrap_or(0.0) >= params.score_threshold)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(params.limit as usize);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CollectionSpec {
        CollectionSpec::new("test", 3)
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        gw.ensure_collection(&spec()).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_collection_rejects_dim_mismatch() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        let mismatched = CollectionSpec::new("test", 5);
        let err = gw.ensure_collection(&mismatched).await.unwrap_err();
        assert!(matches!(err, IndexMeshError::Fatal(_)));
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        let id = Uuid::new_v4();
        gw.upsert_batch(
            "test",
            vec![GatewayPoint {
                id,
                vector: vec![1.0, 0.0, 0.0],
                payload: serde_json::json!({"author_handle": "alice"}),
            }],
        )
        .await
        .unwrap();

        let point = gw.get_point("test", id).await.unwrap().unwrap();
        assert_eq!(point.vector, Some(vec![1.0, 0.0, 0.0]));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension_per_point() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        let outcome = gw
            .upsert_batch(
                "test",
                vec![GatewayPoint {
                    id: Uuid::new_v4(),
                    vector: vec![1.0, 0.0],
                    payload: serde_json::Value::Null,
                }],
            )
            .await
            .unwrap();
        assert_eq!(outcome.stored_count, 0);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_ids_removes_points() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        let id = Uuid::new_v4();
        gw.upsert_batch(
            "test",
            vec![GatewayPoint {
                id,
                vector: vec![1.0, 0.0, 0.0],
                payload: serde_json::Value::Null,
            }],
        )
        .await
        .unwrap();
        let removed = gw.delete_by_ids("test", &[id]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(gw.get_point("test", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_filtered_by_field_eq() {
        let gw = InMemoryGateway::new();
        gw.ensure_collection(&spec()).await.unwrap();
        gw.upsert_batch(
            "test",
            vec![
                GatewayPoint {
                    id: Uuid::new_v4(),
                    vector: vec![1.0, 0.0, 0.0],
                    payload: serde_json::json!({"author_handle": "alice"}),
                },
                GatewayPoint {
                    id: Uuid::new_v4(),
                    vector: vec![0.0, 1.0, 0.0],
                    payload: serde_json::json!({"author_handle": "bob"}),
                },
            ],
        )
        .await
        .unwrap();

        let results = gw
            .search_filtered(
                "test",
                SearchParams {
                    vector: None,
                    filter: Some(crate::gateway::FieldEq {
                        field: "author_handle".into(),
                        value: "alice".into(),
                    }),
                    limit: 10,
                    with_payload: true,
                    with_vector: false,
                    score_threshold: 0.0,
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["author_handle"], "alice");
    }
}

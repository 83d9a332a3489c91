//! Qdrant-backed implementation of [`VectorStoreGateway`].
//!
//! Grounded directly on the provider's Rust client builder API (the same
//! shape used for `CreateCollectionBuilder`/`VectorParamsBuilder` elsewhere
//! in this ecosystem): collection HNSW/optimizer fields map one-to-one
//! onto `HnswConfigDiff`/`OptimizersConfigDiff`, so §6's "bit-exact"
//! collection spec is a direct field-for-field translation, not a
//! reinterpretation.

use std::time::Duration;

use async_trait::async_trait;
use indexmesh_common::IndexMeshError;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, Filter, GetPointsBuilder, HnswConfigDiff,
    OptimizersConfigDiff, PointStruct, PointsIdsList, PointsSelector, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, WithPayloadSelector,
    WithVectorsSelector,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collection::{CollectionSpec, DistanceMetric};
use crate::gateway::{
    FieldEq, GatewayPoint, RetrievedPoint, SearchParams, UpsertOutcome, VectorStoreGateway,
};
use crate::retry::retry_with_backoff;

/// Connection settings for the Qdrant gateway.
#[derive(Debug, Clone)]
pub struct QdrantGatewayConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

pub struct QdrantGateway {
    client: Qdrant,
    /// Dimension recorded per collection by `ensure_collection`, consulted
    /// by `upsert_batch` to reject a bad-dimension point before it's ever
    /// sent to the provider.
    known_dims: std::sync::Mutex<std::collections::HashMap<String, usize>>,
}

impl QdrantGateway {
    pub fn connect(config: QdrantGatewayConfig) -> Result<Self, IndexMeshError> {
        let mut builder = qdrant_client::config::QdrantConfig::from_url(&config.url);
        builder.set_timeout(config.timeout);
        if let Some(key) = &config.api_key {
            builder.set_api_key(key);
        }
        let client = Qdrant::new(builder)
            .map_err(|e| IndexMeshError::VectorStore(format!("failed to create qdrant client: {e}")))?;
        Ok(Self {
            client,
            known_dims: std::sync::Mutex::new(std::collections::HashMap::new()),
        })
    }

    async fn retrying<T, Fut>(&self, op: impl FnMut() -> Fut) -> Result<T, IndexMeshError>
    where
        Fut: std::future::Future<Output = Result<T, IndexMeshError>>,
    {
        retry_with_backoff(3, Duration::from_millis(200), is_retryable, op).await
    }
}

fn is_retryable(err: &IndexMeshError) -> bool {
    matches!(err, IndexMeshError::Transient(_) | IndexMeshError::Timeout(_))
}

fn map_qdrant_err(context: &str, err: impl std::fmt::Display) -> IndexMeshError {
    let msg = err.to_string();
    // Qdrant's client surfaces transport failures and 5xx/429 status codes
    // in the error text; without a typed status code we classify on the
    // message, same as the provider's own examples do for this client.
    if msg.contains("429") || msg.contains("503") || msg.contains("timed out") || msg.contains("connection") {
        IndexMeshError::Transient(format!("{context}: {msg}"))
    } else {
        IndexMeshError::VectorStore(format!("{context}: {msg}"))
    }
}

fn distance_to_qdrant(d: DistanceMetric) -> Distance {
    match d {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Euclid => Distance::Euclid,
        DistanceMetric::Dot => Distance::Dot,
    }
}

fn json_to_qdrant_payload(value: &serde_json::Value) -> qdrant_client::Payload {
    qdrant_client::Payload::try_from(value.clone())
        .unwrap_or_else(|_| qdrant_client::Payload::new())
}

fn qdrant_payload_to_json(payload: std::collections::HashMap<String, QdrantValue>) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

#[async_trait]
impl VectorStoreGateway for QdrantGateway {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexMeshError> {
        let exists = self
            .client
            .collection_exists(&spec.name)
            .await
            .map_err(|e| map_qdrant_err("collection_exists", e))?;

        if exists {
            let info = self
                .client
                .collection_info(&spec.name)
                .await
                .map_err(|e| map_qdrant_err("collection_info", e))?;

            let existing_dim = info
                .result
                .as_ref()
                .and_then(|r| r.config.as_ref())
                .and_then(|c| c.params.as_ref())
                .and_then(|p| p.vectors_config.as_ref())
                .and_then(|v| v.config.as_ref())
                .and_then(|c| match c {
                    qdrant_client::qdrant::vectors_config::Config::Params(p) => Some(p.size as usize),
                    _ => None,
                });

            if let Some(existing_dim) = existing_dim {
                if existing_dim != spec.dim {
                    return Err(IndexMeshError::Fatal(format!(
                        "collection {} exists with dim {existing_dim}, expected {}",
                        spec.name, spec.dim
                    )));
                }
            }

            debug!(collection = %spec.name, "Collection already exists, validated");
            self.known_dims.lock().unwrap().insert(spec.name.clone(), spec.dim);
            return Ok(());
        }

        info!(collection = %spec.name, dim = spec.dim, "Creating collection");

        let vector_params = VectorParamsBuilder::new(spec.dim as u64, distance_to_qdrant(spec.distance)).hnsw_config(
            HnswConfigDiff {
                m: Some(spec.hnsw.m),
                ef_construct: Some(spec.hnsw.ef_construct),
                full_scan_threshold: Some(spec.hnsw.full_scan_threshold),
                ..Default::default()
            },
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&spec.name)
                    .vectors_config(vector_params)
                    .on_disk_payload(spec.on_disk_payload)
                    .optimizers_config(OptimizersConfigDiff {
                        deleted_threshold: Some(spec.optimizers.deleted_threshold),
                        vacuum_min_vector_number: Some(spec.optimizers.vacuum_min_vector_number),
                        ..Default::default()
                    }),
            )
            .await
            .map_err(|e| IndexMeshError::Fatal(format!("collection ensure failed: {e}")))?;

        self.known_dims.lock().unwrap().insert(spec.name.clone(), spec.dim);
        Ok(())
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<GatewayPoint>,
    ) -> Result<UpsertOutcome, IndexMeshError> {
        let dim = self.known_dims.lock().unwrap().get(collection).copied();

        let mut qdrant_points = Vec::with_capacity(points.len());
        let mut outcome = UpsertOutcome::default();

        for (idx, p) in points.iter().enumerate() {
            // §3 invariant: point dimension is checked here, once, against
            // the dimension recorded by `ensure_collection` — a bad point
            // never reaches the provider.
            if let Some(dim) = dim {
                if p.vector.len() != dim {
                    outcome.errors.push((
                        idx,
                        format!("dimension mismatch: expected {dim}, got {}", p.vector.len()),
                    ));
                    continue;
                }
            }
            qdrant_points.push(PointStruct::new(
                p.id.to_string(),
                p.vector.clone(),
                json_to_qdrant_payload(&p.payload),
            ));
        }

        if qdrant_points.is_empty() {
            return Ok(outcome);
        }

        let collection_owned = collection.to_string();
        let result = self
            .retrying(|| {
                let collection = collection_owned.clone();
                let batch = qdrant_points.clone();
                async move {
                    self.client
                        .upsert_points(UpsertPointsBuilder::new(collection, batch).wait(true))
                        .await
                        .map_err(|e| map_qdrant_err("upsert_points", e))
                }
            })
            .await;

        match result {
            Ok(_) => {
                outcome.stored_count = qdrant_points.len();
                Ok(outcome)
            }
            Err(e) => {
                warn!(collection, error = %e, "Batch upsert failed");
                Err(e)
            }
        }
    }

    async fn get_point(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<RetrievedPoint>, IndexMeshError> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![id.to_string().into()])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| map_qdrant_err("get_points", e))?;

        Ok(response.result.into_iter().next().map(|p| RetrievedPoint {
            id,
            vector: p.vectors.and_then(|v| v.as_vec()),
            payload: qdrant_payload_to_json(p.payload),
            score: None,
        }))
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize, IndexMeshError> {
        let point_ids = ids.iter().map(|id| id.to_string().into()).collect::<Vec<_>>();
        let selector = PointsSelector::from(PointsIdsList { ids: point_ids });

        self.client
            .delete_points(qdrant_client::qdrant::DeletePointsBuilder::new(collection).points(selector))
            .await
            .map_err(|e| map_qdrant_err("delete_points", e))?;

        Ok(ids.len())
    }

    async fn search_filtered(
        &self,
        collection: &str,
        params: SearchParams,
    ) -> Result<Vec<RetrievedPoint>, IndexMeshError> {
        let vector = params.vector.unwrap_or_else(|| vec![0.0; 1]);
        let mut builder = SearchPointsBuilder::new(collection, vector, params.limit)
            .with_payload(WithPayloadSelector::from(params.with_payload))
            .with_vectors(WithVectorsSelector::from(params.with_vector))
            .score_threshold(params.score_threshold);

        if let Some(FieldEq { field, value }) = params.filter {
            builder = builder.filter(Filter::must([
                qdrant_client::qdrant::Condition::matches(field, value),
            ]));
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| map_qdrant_err("search_points", e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = p.id.and_then(|id| match id.point_id_options {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => {
                        Uuid::parse_str(&s).ok()
                    }
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                        Some(Uuid::from_u128(n as u128))
                    }
                    None => None,
                })?;
                Some(RetrievedPoint {
                    id,
                    vector: p.vectors.and_then(|v| v.as_vec()),
                    payload: qdrant_payload_to_json(p.payload),
                    score: Some(p.score),
                })
            })
            .collect())
    }
}

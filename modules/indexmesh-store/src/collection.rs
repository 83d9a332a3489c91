use serde::{Deserialize, Serialize};

/// Distance metric for a collection. The spec fixes this to cosine (§6),
/// but the type stays general so `ensure_collection` can detect a mismatch
/// against whatever is actually configured on the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Euclid,
    Dot,
}

/// HNSW index parameters (§6, bit-exact defaults).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: u64,
    pub ef_construct: u64,
    pub full_scan_threshold: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construct: 100,
            full_scan_threshold: 10_000,
        }
    }
}

/// Optimizer parameters (§6, bit-exact defaults).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerParams {
    pub deleted_threshold: f64,
    pub vacuum_min_vector_number: u64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            deleted_threshold: 0.2,
            vacuum_min_vector_number: 1_000,
        }
    }
}

/// The collection-wide contract (§3, §6). `ensure_collection` is idempotent
/// against this exact spec: if the collection already exists, `dim` and
/// `distance` are validated to match and a mismatch is a hard failure —
/// never a silent reconfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub dim: usize,
    pub distance: DistanceMetric,
    pub on_disk_payload: bool,
    pub hnsw: HnswParams,
    pub optimizers: OptimizerParams,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            dim,
            distance: DistanceMetric::Cosine,
            on_disk_payload: true,
            hnsw: HnswParams::default(),
            optimizers: OptimizerParams::default(),
        }
    }
}

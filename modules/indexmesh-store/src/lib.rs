pub mod collection;
pub mod gateway;
pub mod inmemory;
pub mod qdrant_gateway;
pub mod retry;

pub use collection::{CollectionSpec, DistanceMetric, HnswParams, OptimizerParams};
pub use gateway::{FieldEq, GatewayPoint, RetrievedPoint, SearchParams, UpsertOutcome, VectorStoreGateway};
pub use inmemory::InMemoryGateway;
pub use qdrant_gateway::{QdrantGateway, QdrantGatewayConfig};

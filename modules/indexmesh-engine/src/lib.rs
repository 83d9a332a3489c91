pub mod boundary;
pub mod budget;
pub mod indexer;
pub mod normalizer;
pub mod rotation;
pub mod scheduler;
pub mod stats;

pub use boundary::BoundaryIndex;
pub use budget::RequestBudget;
pub use indexer::{default_priority_states, IndexerCore};
pub use normalizer::{NormalizeOutcome, Normalizer};
pub use rotation::{apply_feedback, plan, RotationPlanEntry};
pub use scheduler::{Scheduler, SourceSchedulerStatus, SourceTrigger};
pub use stats::{SourceStats, StatsRegistry};

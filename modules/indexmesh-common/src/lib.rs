pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LogFormat};
pub use error::{IndexMeshError, Result};
pub use types::*;

pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod optimize;

pub use config::{Config, OptimizationConfig};
pub use error::{FlowkgError, Result};
pub use graph::{ComponentType, GraphStore, PathSuggestion, Pattern, SnapshotSource};
pub use optimize::{CandidateComponent, FlowOptimizer, OptimizationResult};

//! Knowledge graph module: snapshot model, statistics, path search and the
//! atomically swapped store.
//!
//! A raw snapshot (transition counts, per-type occurrence counts, observed
//! flow sequences) is turned into a [`GraphSnapshot`], compiled into
//! probabilities and a pattern catalogue by the [`StatisticsCompiler`], and
//! published through the [`GraphStore`]. Readers only ever hold an `Arc` to a
//! complete, immutable [`CompiledGraph`].

mod paths;
mod snapshot;
mod source;
mod statistics;
mod store;

pub use paths::{PathFinder, PathSuggestion};
pub use snapshot::{GraphSnapshot, TypeInterner};
pub use source::{ConfiguredSource, JsonSnapshotSource, SnapshotSource, SqliteSnapshotSource};
pub use statistics::{CompiledGraph, Pattern, StatisticsCompiler};
pub use store::{spawn_periodic_refresh, GraphStore, PublishedSnapshot, RefreshOutcome};

use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Category of a flow step (start trigger, routing gate, service call, ...).
///
/// Inside one snapshot every occurrence of a name shares a single allocation
/// (see [`TypeInterner`]), so clones are a reference-count bump and equality
/// usually short-circuits on the pointer.
#[derive(Clone)]
pub struct ComponentType(Arc<str>);

impl ComponentType {
    /// Create a standalone (non-interned) type
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for ComponentType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for ComponentType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Observed adjacency `source -> target` with its empirical probability.
///
/// `probability` is 0 until the snapshot has been compiled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEdge {
    pub source: ComponentType,
    pub target: ComponentType,
    pub observed_count: u64,
    pub probability: f64,
}

/// Aggregated `(source, target, count)` triple as delivered by a snapshot source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransition {
    pub source: String,
    pub target: String,
    pub count: u64,
}

/// Corpus-wide occurrence count of one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrequency {
    pub component_type: String,
    pub count: u64,
}

/// Everything a snapshot source delivers on `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
    #[serde(default)]
    pub frequencies: Vec<RawFrequency>,
    /// Observed flows, each an ordered list of component types
    #[serde(default)]
    pub flows: Vec<Vec<String>>,
}

impl RawSnapshot {
    /// SHA-256 over the snapshot content, in delivery order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"transitions");
        for t in &self.transitions {
            hasher.update(t.source.as_bytes());
            hasher.update([0u8]);
            hasher.update(t.target.as_bytes());
            hasher.update([0u8]);
            hasher.update(t.count.to_le_bytes());
        }
        hasher.update(b"frequencies");
        for f in &self.frequencies {
            hasher.update(f.component_type.as_bytes());
            hasher.update([0u8]);
            hasher.update(f.count.to_le_bytes());
        }
        hasher.update(b"flows");
        for flow in &self.flows {
            for step in flow {
                hasher.update(step.as_bytes());
                hasher.update([0u8]);
            }
            hasher.update([1u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.frequencies.is_empty() && self.flows.is_empty()
    }
}

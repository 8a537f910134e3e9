//! Atomically swapped holder of the published graph.
//!
//! Readers clone an `Arc<PublishedSnapshot>` and keep using it for the whole
//! request; `load`/`install` compile a replacement off to the side and swap the
//! pointer under a short write lock. The old snapshot is freed once its last
//! reader drops it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{CompiledGraph, GraphSnapshot, RawSnapshot, SnapshotSource, StatisticsCompiler};
use crate::error::{FlowkgError, Result};

/// One complete, immutable generation of the graph.
#[derive(Debug)]
pub struct PublishedSnapshot {
    pub generation: Uuid,
    pub loaded_at: DateTime<Utc>,
    /// SHA-256 of the raw content this generation was compiled from
    pub fingerprint: String,
    graph: CompiledGraph,
}

impl PublishedSnapshot {
    fn new(graph: CompiledGraph, fingerprint: String) -> Self {
        Self {
            generation: Uuid::new_v4(),
            loaded_at: Utc::now(),
            fingerprint,
            graph,
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }
}

/// Result of a refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new generation was published
    Replaced {
        generation: Uuid,
        types: usize,
        edges: usize,
        patterns: usize,
    },
    /// Fetched content matched the active generation; nothing was swapped
    Unchanged,
}

pub struct GraphStore {
    current: RwLock<Arc<PublishedSnapshot>>,
    compiler: StatisticsCompiler,
}

impl GraphStore {
    /// Create a store holding an empty graph
    pub fn new(compiler: StatisticsCompiler) -> Self {
        let empty = PublishedSnapshot::new(CompiledGraph::default(), RawSnapshot::default().fingerprint());
        Self {
            current: RwLock::new(Arc::new(empty)),
            compiler,
        }
    }

    /// The generation active right now. Later swaps do not affect the returned `Arc`.
    pub fn snapshot(&self) -> Arc<PublishedSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Like [`snapshot`](Self::snapshot), but reports `EmptyGraph` when nothing has been loaded.
    pub fn require_data(&self) -> Result<Arc<PublishedSnapshot>> {
        let snapshot = self.snapshot();
        if snapshot.graph().is_empty() {
            return Err(FlowkgError::EmptyGraph);
        }
        Ok(snapshot)
    }

    /// Compile `raw` and publish it, unless it is identical to the active generation.
    pub fn install(&self, raw: RawSnapshot) -> RefreshOutcome {
        let fingerprint = raw.fingerprint();
        if self.snapshot().fingerprint == fingerprint {
            log::debug!("Snapshot content unchanged ({}), keeping current generation", &fingerprint[..12]);
            return RefreshOutcome::Unchanged;
        }

        let compiled = self.compiler.compile(GraphSnapshot::from_raw(&raw));
        let published = Arc::new(PublishedSnapshot::new(compiled, fingerprint));
        let outcome = RefreshOutcome::Replaced {
            generation: published.generation,
            types: published.graph().graph().type_count(),
            edges: published.graph().graph().edge_count(),
            patterns: published.graph().pattern_count(),
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = published;
        outcome
    }

    /// Fetch from `source` and publish the result.
    ///
    /// On failure the previous generation stays active and the error is
    /// returned to this caller only.
    pub async fn load<S: SnapshotSource>(&self, source: &S) -> Result<RefreshOutcome> {
        let raw = match source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Snapshot refresh from {} failed, keeping current generation: {}", source.describe(), e);
                return Err(e);
            }
        };

        let outcome = self.install(raw);
        if let RefreshOutcome::Replaced { generation, types, edges, patterns } = &outcome {
            log::info!(
                "Loaded graph generation {} from {} ({} types, {} edges, {} patterns)",
                generation,
                source.describe(),
                types,
                edges,
                patterns
            );
        }
        Ok(outcome)
    }
}

/// Refresh `store` from `source` every `every` until the task is aborted.
/// Failures are logged and retried at the next tick.
pub fn spawn_periodic_refresh<S>(store: Arc<GraphStore>, source: Arc<S>, every: Duration) -> JoinHandle<()>
where
    S: SnapshotSource + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.load(source.as_ref()).await {
                Ok(RefreshOutcome::Unchanged) => log::debug!("Periodic refresh: snapshot unchanged"),
                Ok(RefreshOutcome::Replaced { .. }) => {}
                Err(e) => log::error!("Periodic refresh failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RawTransition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(transitions: &[(&str, &str, u64)]) -> RawSnapshot {
        RawSnapshot {
            transitions: transitions
                .iter()
                .map(|(s, t, c)| RawTransition { source: s.to_string(), target: t.to_string(), count: *c })
                .collect(),
            ..Default::default()
        }
    }

    fn store() -> GraphStore {
        GraphStore::new(StatisticsCompiler::new(10, vec![2]))
    }

    struct FixedSource(RawSnapshot);

    impl SnapshotSource for FixedSource {
        async fn fetch(&self) -> Result<RawSnapshot> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    struct UnreachableSource;

    impl SnapshotSource for UnreachableSource {
        async fn fetch(&self) -> Result<RawSnapshot> {
            Err(FlowkgError::DataUnavailable("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "unreachable".to_string()
        }
    }

    /// Serves A->B on the first fetch and X->Y afterwards
    struct ChangingSource {
        calls: AtomicUsize,
    }

    impl SnapshotSource for ChangingSource {
        async fn fetch(&self) -> Result<RawSnapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 0 { raw(&[("A", "B", 1)]) } else { raw(&[("X", "Y", 1)]) })
        }

        fn describe(&self) -> String {
            "changing".to_string()
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = store();
        assert!(store.snapshot().graph().is_empty());
        assert!(matches!(store.require_data(), Err(FlowkgError::EmptyGraph)));
    }

    #[tokio::test]
    async fn test_load_publishes_new_generation() {
        let store = store();
        let outcome = store.load(&FixedSource(raw(&[("A", "B", 2), ("A", "C", 2)]))).await.unwrap();
        match outcome {
            RefreshOutcome::Replaced { types, edges, .. } => {
                assert_eq!(types, 3);
                assert_eq!(edges, 2);
            }
            RefreshOutcome::Unchanged => panic!("expected a new generation"),
        }
        assert_eq!(store.require_data().unwrap().graph().probability("A", "B"), Some(0.5));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_graph() {
        let store = store();
        store.install(raw(&[("A", "B", 1)]));
        let before = store.snapshot().generation;

        let err = store.load(&UnreachableSource).await.unwrap_err();
        assert!(matches!(err, FlowkgError::DataUnavailable(_)));

        let after = store.snapshot();
        assert_eq!(after.generation, before);
        assert_eq!(after.graph().probability("A", "B"), Some(1.0));
    }

    #[test]
    fn test_identical_content_is_unchanged() {
        let store = store();
        assert!(matches!(store.install(raw(&[("A", "B", 1)])), RefreshOutcome::Replaced { .. }));
        let generation = store.snapshot().generation;
        assert_eq!(store.install(raw(&[("A", "B", 1)])), RefreshOutcome::Unchanged);
        assert_eq!(store.snapshot().generation, generation);
    }

    #[test]
    fn test_reader_keeps_old_snapshot_across_swap() {
        let store = store();
        store.install(raw(&[("A", "B", 1)]));
        let held = store.snapshot();

        store.install(raw(&[("X", "Y", 1)]));

        assert_eq!(held.graph().probability("A", "B"), Some(1.0));
        assert_eq!(held.graph().probability("X", "Y"), None);
        let fresh = store.snapshot();
        assert_eq!(fresh.graph().probability("X", "Y"), Some(1.0));
        assert_eq!(fresh.graph().probability("A", "B"), None);
    }

    #[test]
    fn test_concurrent_readers_see_complete_generations() {
        let store = Arc::new(store());
        store.install(raw(&[("A", "B", 1), ("A", "C", 1)]));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snap = store.snapshot();
                        let sum: f64 = snap.graph().edges_from("A").iter().map(|e| e.probability).sum();
                        let other: f64 = snap.graph().edges_from("X").iter().map(|e| e.probability).sum();
                        // Exactly one of the two generations is visible, never a mix
                        assert!(((sum - 1.0).abs() < 1e-9) ^ ((other - 1.0).abs() < 1e-9));
                    }
                })
            })
            .collect();

        for i in 0..50 {
            if i % 2 == 0 {
                store.install(raw(&[("X", "Y", 1)]));
            } else {
                store.install(raw(&[("A", "B", 1), ("A", "C", 1)]));
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_periodic_refresh_swaps_generations() {
        let store = Arc::new(store());
        let source = Arc::new(ChangingSource { calls: AtomicUsize::new(0) });

        let handle = spawn_periodic_refresh(Arc::clone(&store), Arc::clone(&source), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.snapshot().graph().probability("X", "Y"), Some(1.0));
    }

    #[tokio::test]
    async fn test_periodic_refresh_survives_failures() {
        let store = Arc::new(store());
        store.install(raw(&[("A", "B", 1)]));

        let handle = spawn_periodic_refresh(Arc::clone(&store), Arc::new(UnreachableSource), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();

        assert_eq!(store.snapshot().graph().probability("A", "B"), Some(1.0));
    }
}

//! Count-level graph built from a raw snapshot.

use std::collections::{HashMap, HashSet};

use super::{ComponentType, RawSnapshot, TransitionEdge};

/// Hands out one shared allocation per distinct type name.
#[derive(Debug, Default)]
pub struct TypeInterner {
    types: HashSet<ComponentType>,
}

impl TypeInterner {
    pub fn intern(&mut self, name: &str) -> ComponentType {
        if let Some(existing) = self.types.get(name) {
            return existing.clone();
        }
        let interned = ComponentType::new(name);
        self.types.insert(interned.clone());
        interned
    }

    pub fn into_types(self) -> HashSet<ComponentType> {
        self.types
    }
}

/// Aggregated relationship graph: typed transition edges, occurrence counts
/// and the observed flow sequences they were mined from.
#[derive(Debug, Default)]
pub struct GraphSnapshot {
    pub(crate) types: HashSet<ComponentType>,
    /// Outgoing edges per source, most frequent first
    pub(crate) edges: HashMap<ComponentType, Vec<TransitionEdge>>,
    pub(crate) frequencies: HashMap<ComponentType, u64>,
    pub(crate) total_occurrences: u64,
    pub(crate) flows: Vec<Vec<ComponentType>>,
}

impl GraphSnapshot {
    /// Build the graph, summing duplicate triples and dropping blank type names.
    pub fn from_raw(raw: &RawSnapshot) -> Self {
        let mut interner = TypeInterner::default();
        let mut counts: HashMap<(ComponentType, ComponentType), u64> = HashMap::new();
        let mut frequencies: HashMap<ComponentType, u64> = HashMap::new();
        let mut skipped = 0usize;

        for t in &raw.transitions {
            if t.source.trim().is_empty() || t.target.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let key = (interner.intern(&t.source), interner.intern(&t.target));
            let count = counts.entry(key).or_insert(0);
            *count = count.saturating_add(t.count);
        }

        for f in &raw.frequencies {
            if f.component_type.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let count = frequencies.entry(interner.intern(&f.component_type)).or_insert(0);
            *count = count.saturating_add(f.count);
        }

        let flows: Vec<Vec<ComponentType>> = raw
            .flows
            .iter()
            .filter(|flow| {
                let blank = flow.iter().any(|step| step.trim().is_empty());
                if blank {
                    skipped += 1;
                }
                !blank
            })
            .map(|flow| flow.iter().map(|step| interner.intern(step)).collect())
            .collect();

        if skipped > 0 {
            log::warn!("Skipped {} snapshot records with blank component types", skipped);
        }

        let mut edges: HashMap<ComponentType, Vec<TransitionEdge>> = HashMap::new();
        for ((source, target), observed_count) in counts {
            edges.entry(source.clone()).or_default().push(TransitionEdge {
                source,
                target,
                observed_count,
                probability: 0.0,
            });
        }
        for out in edges.values_mut() {
            out.sort_by(|a, b| {
                b.observed_count
                    .cmp(&a.observed_count)
                    .then_with(|| a.target.cmp(&b.target))
            });
        }

        let total_occurrences = frequencies.values().fold(0u64, |acc, c| acc.saturating_add(*c));

        Self {
            types: interner.into_types(),
            edges,
            frequencies,
            total_occurrences,
            flows,
        }
    }

    /// Outgoing edges of `component_type`; empty for sinks and unknown types.
    pub fn edges_from(&self, component_type: &str) -> &[TransitionEdge] {
        self.edges
            .get(component_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn frequency_of(&self, component_type: &str) -> u64 {
        self.frequencies.get(component_type).copied().unwrap_or(0)
    }

    pub fn total_occurrences(&self) -> u64 {
        self.total_occurrences
    }

    /// The interned handle for `name`, if the snapshot mentions it anywhere.
    pub fn resolve(&self, name: &str) -> Option<ComponentType> {
        self.types.get(name).cloned()
    }

    /// Per-type occurrence counts, most frequent first, ties by name.
    pub fn ranked_frequencies(&self) -> Vec<(&ComponentType, u64)> {
        let mut ranked: Vec<(&ComponentType, u64)> = self.frequencies.iter().map(|(t, c)| (t, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Every edge in the snapshot, in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = &TransitionEdge> {
        self.edges.values().flatten()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.frequencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RawFrequency, RawTransition};
    use std::sync::Arc;

    fn transition(source: &str, target: &str, count: u64) -> RawTransition {
        RawTransition { source: source.into(), target: target.into(), count }
    }

    #[test]
    fn test_interner_shares_allocation() {
        let mut interner = TypeInterner::default();
        let a = interner.intern("Gate");
        let b = interner.intern("Gate");
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_duplicate_transitions_are_summed() {
        let raw = RawSnapshot {
            transitions: vec![transition("A", "B", 2), transition("A", "B", 3), transition("A", "C", 1)],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        let out = graph.edges_from("A");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target.as_str(), "B");
        assert_eq!(out[0].observed_count, 5);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_unknown_type_queries_are_empty() {
        let raw = RawSnapshot {
            transitions: vec![transition("A", "B", 1)],
            frequencies: vec![RawFrequency { component_type: "A".into(), count: 4 }],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        assert!(graph.edges_from("Nope").is_empty());
        assert!(graph.edges_from("B").is_empty());
        assert_eq!(graph.frequency_of("Nope"), 0);
        assert_eq!(graph.frequency_of("A"), 4);
        assert_eq!(graph.total_occurrences(), 4);
    }

    #[test]
    fn test_blank_types_skipped() {
        let raw = RawSnapshot {
            transitions: vec![transition("", "B", 1), transition("A", "B", 1)],
            flows: vec![vec!["A".into(), " ".into()], vec!["A".into(), "B".into()]],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.flows.len(), 1);
        assert!(graph.resolve("").is_none());
    }

    #[test]
    fn test_edges_share_interned_types() {
        let raw = RawSnapshot {
            transitions: vec![transition("A", "B", 1), transition("B", "C", 1)],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        let ab = &graph.edges_from("A")[0];
        let bc = &graph.edges_from("B")[0];
        assert!(Arc::ptr_eq(&ab.target.0, &bc.source.0));
    }

    #[test]
    fn test_huge_counts_saturate() {
        let raw = RawSnapshot {
            transitions: vec![transition("A", "B", u64::MAX), transition("A", "B", 5)],
            frequencies: vec![
                RawFrequency { component_type: "A".into(), count: u64::MAX },
                RawFrequency { component_type: "B".into(), count: u64::MAX },
            ],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        assert_eq!(graph.edges_from("A")[0].observed_count, u64::MAX);
        assert_eq!(graph.total_occurrences(), u64::MAX);
    }

    #[test]
    fn test_ranked_frequencies() {
        let raw = RawSnapshot {
            frequencies: vec![
                RawFrequency { component_type: "B".into(), count: 2 },
                RawFrequency { component_type: "C".into(), count: 5 },
                RawFrequency { component_type: "A".into(), count: 2 },
            ],
            ..Default::default()
        };
        let graph = GraphSnapshot::from_raw(&raw);
        let ranked: Vec<(&str, u64)> = graph
            .ranked_frequencies()
            .into_iter()
            .map(|(t, c)| (t.as_str(), c))
            .collect();
        assert_eq!(ranked, vec![("C", 5), ("A", 2), ("B", 2)]);
    }
}

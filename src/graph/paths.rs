//! Beam-bounded highest-probability path search.
//!
//! Edge weight is `-ln(p)`, so the lowest accumulated weight is the path with
//! the highest product of transition probabilities. Zero-probability edges have
//! infinite weight and are never expanded.

use serde::Serialize;
use std::cmp::Ordering;

use super::{CompiledGraph, ComponentType};

/// A ranked multi-hop sequence connecting a start type to an end type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSuggestion {
    pub types: Vec<ComponentType>,
    /// Product of transition probabilities along the path
    pub confidence: f64,
}

impl PathSuggestion {
    pub fn hops(&self) -> usize {
        self.types.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
struct PartialPath {
    types: Vec<ComponentType>,
    weight: f64,
    confidence: f64,
}

impl PartialPath {
    fn last(&self) -> &ComponentType {
        // Paths always start with at least the start type
        &self.types[self.types.len() - 1]
    }

    fn extend(&self, next: &ComponentType, probability: f64) -> Self {
        let mut types = Vec::with_capacity(self.types.len() + 1);
        types.extend_from_slice(&self.types);
        types.push(next.clone());
        Self {
            types,
            weight: self.weight - probability.ln(),
            confidence: self.confidence * probability,
        }
    }

    fn into_suggestion(self) -> PathSuggestion {
        PathSuggestion {
            types: self.types,
            confidence: self.confidence,
        }
    }
}

fn by_weight(a: &PartialPath, b: &PartialPath) -> Ordering {
    a.weight
        .total_cmp(&b.weight)
        .then_with(|| a.types.cmp(&b.types))
}

fn by_rank(a: &PathSuggestion, b: &PathSuggestion) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.hops().cmp(&b.hops()))
        .then_with(|| a.types.cmp(&b.types))
}

/// Path search over one compiled snapshot.
pub struct PathFinder<'a> {
    graph: &'a CompiledGraph,
    beam_width: usize,
}

impl<'a> PathFinder<'a> {
    pub fn new(graph: &'a CompiledGraph, beam_width: usize) -> Self {
        Self {
            graph,
            beam_width: beam_width.max(1),
        }
    }

    /// Up to `beam_width` paths from `start` to `end` with at most `max_hops`
    /// edges, best confidence first. No path visits a type twice.
    ///
    /// `start == end` yields the single zero-hop path `[start]` with
    /// confidence 1.0, unless the graph is empty.
    pub fn find_paths(&self, start: &str, end: &str, max_hops: usize) -> Vec<PathSuggestion> {
        if self.graph.is_empty() {
            return Vec::new();
        }

        if start == end {
            let start = self
                .graph
                .graph()
                .resolve(start)
                .unwrap_or_else(|| ComponentType::new(start));
            return vec![PathSuggestion {
                types: vec![start],
                confidence: 1.0,
            }];
        }

        let Some(start) = self.graph.graph().resolve(start) else {
            return Vec::new();
        };

        let mut beam = vec![PartialPath {
            types: vec![start],
            weight: 0.0,
            confidence: 1.0,
        }];
        let mut complete: Vec<PathSuggestion> = Vec::new();

        for _ in 0..max_hops {
            let mut next: Vec<PartialPath> = Vec::new();
            for partial in &beam {
                for edge in self.graph.edges_from(partial.last().as_str()) {
                    if edge.probability <= 0.0 || partial.types.contains(&edge.target) {
                        continue;
                    }
                    let extended = partial.extend(&edge.target, edge.probability);
                    if edge.target.as_str() == end {
                        complete.push(extended.into_suggestion());
                    } else {
                        next.push(extended);
                    }
                }
            }

            next.sort_by(by_weight);
            next.truncate(self.beam_width);
            if next.is_empty() {
                break;
            }
            beam = next;
        }

        complete.sort_by(by_rank);
        complete.truncate(self.beam_width);
        complete
    }
}

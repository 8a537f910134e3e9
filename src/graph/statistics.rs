//! Transition probabilities, frequency shares and the pattern catalogue.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{ComponentType, GraphSnapshot, TransitionEdge};
use crate::config::OptimizationConfig;

/// An observed run of `steps` consecutive transitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub types: Vec<ComponentType>,
    /// Number of times this exact sequence occurs in the corpus
    pub frequency: u64,
    /// Product of the transition probabilities along the sequence
    pub confidence: f64,
}

impl Pattern {
    pub fn steps(&self) -> usize {
        self.types.len().saturating_sub(1)
    }
}

/// Compiled, read-only view published by the store.
#[derive(Debug, Default)]
pub struct CompiledGraph {
    graph: GraphSnapshot,
    shares: HashMap<ComponentType, f64>,
    patterns: BTreeMap<usize, Vec<Pattern>>,
}

impl CompiledGraph {
    pub fn graph(&self) -> &GraphSnapshot {
        &self.graph
    }

    pub fn edges_from(&self, component_type: &str) -> &[TransitionEdge] {
        self.graph.edges_from(component_type)
    }

    pub fn frequency_of(&self, component_type: &str) -> u64 {
        self.graph.frequency_of(component_type)
    }

    pub fn total_occurrences(&self) -> u64 {
        self.graph.total_occurrences()
    }

    /// Share of all corpus occurrences taken by `component_type`, in [0,1].
    pub fn frequency_share(&self, component_type: &str) -> f64 {
        self.shares.get(component_type).copied().unwrap_or(0.0)
    }

    /// Probability of the transition `from -> to`, `None` if never observed.
    pub fn probability(&self, from: &str, to: &str) -> Option<f64> {
        self.graph
            .edges_from(from)
            .iter()
            .find(|e| e.target.as_str() == to)
            .map(|e| e.probability)
    }

    /// Up to `limit` observed successors of `component_type`, most probable first.
    pub fn top_successors(&self, component_type: &str, limit: usize) -> Vec<ComponentType> {
        self.graph
            .edges_from(component_type)
            .iter()
            .filter(|e| e.probability > 0.0)
            .take(limit)
            .map(|e| e.target.clone())
            .collect()
    }

    /// Retained patterns covering `steps` transitions, best first.
    pub fn patterns(&self, steps: usize) -> &[Pattern] {
        self.patterns.get(&steps).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All retained patterns, shortest step count first.
    pub fn all_patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values().flatten()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Derives probabilities, shares and top-K patterns from a count-level graph.
#[derive(Debug, Clone)]
pub struct StatisticsCompiler {
    top_k: usize,
    pattern_steps: Vec<usize>,
}

impl StatisticsCompiler {
    pub fn new(top_k: usize, pattern_steps: Vec<usize>) -> Self {
        let mut pattern_steps: Vec<usize> = pattern_steps.into_iter().filter(|s| *s > 0).collect();
        pattern_steps.sort_unstable();
        pattern_steps.dedup();
        Self { top_k, pattern_steps }
    }

    pub fn from_config(config: &OptimizationConfig) -> Self {
        Self::new(config.top_k, config.pattern_steps.clone())
    }

    pub fn compile(&self, mut graph: GraphSnapshot) -> CompiledGraph {
        assign_probabilities(&mut graph);
        let shares = frequency_shares(&graph);

        let flows = std::mem::take(&mut graph.flows);
        let patterns: BTreeMap<usize, Vec<Pattern>> = self
            .pattern_steps
            .iter()
            .map(|&steps| (steps, self.top_patterns(&graph, &flows, steps)))
            .collect();

        let compiled = CompiledGraph { graph, shares, patterns };
        log::debug!(
            "Compiled graph: {} types, {} edges, {} patterns from {} flows",
            compiled.graph.type_count(),
            compiled.graph.edge_count(),
            compiled.pattern_count(),
            flows.len()
        );
        compiled
    }

    fn top_patterns(
        &self,
        graph: &GraphSnapshot,
        flows: &[Vec<ComponentType>],
        steps: usize,
    ) -> Vec<Pattern> {
        let mut counts: HashMap<&[ComponentType], u64> = HashMap::new();
        for flow in flows {
            for window in flow.windows(steps + 1) {
                *counts.entry(window).or_insert(0) += 1;
            }
        }

        let mut patterns: Vec<Pattern> = counts
            .into_iter()
            .map(|(types, frequency)| Pattern {
                confidence: sequence_confidence(graph, types),
                types: types.to_vec(),
                frequency,
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.types.cmp(&b.types))
        });
        patterns.truncate(self.top_k);
        patterns
    }
}

/// p(e) = count(e) / sum of counts out of e.source. Zero-sum groups stay at 0.
///
/// Totals are summed as `u128` so large counts cannot overflow.
fn assign_probabilities(graph: &mut GraphSnapshot) {
    for (source, out) in graph.edges.iter_mut() {
        let total: u128 = out.iter().map(|e| u128::from(e.observed_count)).sum();
        if total == 0 {
            log::debug!("Skipping {}: outgoing counts sum to zero", source);
            continue;
        }
        for edge in out.iter_mut() {
            edge.probability = edge.observed_count as f64 / total as f64;
        }
    }
}

fn frequency_shares(graph: &GraphSnapshot) -> HashMap<ComponentType, f64> {
    let total: u128 = graph.frequencies.values().map(|c| u128::from(*c)).sum();
    if total == 0 {
        return HashMap::new();
    }
    graph
        .frequencies
        .iter()
        .map(|(t, count)| (t.clone(), *count as f64 / total as f64))
        .collect()
}

fn sequence_confidence(graph: &GraphSnapshot, types: &[ComponentType]) -> f64 {
    types
        .windows(2)
        .map(|pair| {
            graph
                .edges_from(pair[0].as_str())
                .iter()
                .find(|e| e.target == pair[1])
                .map_or(0.0, |e| e.probability)
        })
        .product()
}

//! Flow optimization facade: the single entry point for callers assembling a
//! flow from retrieved components.
//!
//! Every call captures the store's current snapshot once and computes against
//! it; a concurrent refresh only affects later calls.

mod boost;

pub use boost::{BoostedCandidate, CandidateComponent, ConfidenceBooster};

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OptimizationConfig;
use crate::graph::{CompiledGraph, ComponentType, GraphStore, PathFinder, PathSuggestion, Pattern};

/// Prefix scores below this are flagged in the recommendations
const LOW_SCORE: f64 = 0.5;

/// Follow-up types listed per suggested next component
const FOLLOW_UPS: usize = 3;

/// A likely next step: a successor of the last selected component, or the
/// start component for an empty flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextComponent {
    pub component_type: ComponentType,
    pub probability: f64,
    pub observed_count: u64,
    /// What usually comes after this component
    pub follow_ups: Vec<ComponentType>,
}

/// One consecutive pair of the selected prefix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionCheck {
    pub from: String,
    pub to: String,
    /// `None` when the transition was never observed
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Graph generation the result was computed against
    pub generation: Uuid,
    /// Candidates by descending boosted score
    pub boosted_candidates: Vec<BoostedCandidate>,
    pub path_suggestions: Vec<PathSuggestion>,
    /// Product of observed transition probabilities along the prefix
    pub optimization_score: f64,
    pub next_components: Vec<NextComponent>,
    pub pattern_suggestions: Vec<Pattern>,
    pub transitions: Vec<TransitionCheck>,
    pub recommendations: Vec<String>,
}

pub struct FlowOptimizer {
    store: Arc<GraphStore>,
    config: OptimizationConfig,
}

impl FlowOptimizer {
    pub fn new(store: Arc<GraphStore>, config: OptimizationConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Score the flow built so far and rank what could come next.
    ///
    /// Pure computation: neither the store nor the inputs are modified.
    pub fn optimize<S: AsRef<str>>(
        &self,
        selected_prefix: &[S],
        candidates: &[CandidateComponent],
        end_hint: Option<&str>,
    ) -> OptimizationResult {
        let snapshot = self.store.snapshot();
        let graph = snapshot.graph();
        let prefix: Vec<&str> = selected_prefix.iter().map(AsRef::as_ref).collect();
        let preceding = prefix.last().copied();
        let anchor = preceding.unwrap_or(self.config.start_type.as_str());

        let booster = ConfidenceBooster::new(graph, &self.config);
        let mut boosted_candidates: Vec<BoostedCandidate> = candidates
            .iter()
            .map(|c| booster.boost(c, preceding))
            .collect();
        boosted_candidates.sort_by(|a, b| {
            b.boosted_score
                .total_cmp(&a.boosted_score)
                .then_with(|| a.component_type.cmp(&b.component_type))
        });

        let path_suggestions = end_hint
            .map(|end| {
                PathFinder::new(graph, self.config.beam_width).find_paths(anchor, end, self.config.max_hops)
            })
            .unwrap_or_default();

        let transitions = transition_checks(graph, &prefix);
        let optimization_score = prefix_score(&transitions);
        let next_components = self.next_components(graph, preceding);
        let pattern_suggestions = self.pattern_suggestions(graph, &prefix);
        let recommendations = recommendations(&prefix, optimization_score, &pattern_suggestions, &transitions);

        log::debug!(
            "optimize: prefix={} candidates={} paths={} score={:.3} (generation {})",
            prefix.len(),
            boosted_candidates.len(),
            path_suggestions.len(),
            optimization_score,
            snapshot.generation
        );

        OptimizationResult {
            generation: snapshot.generation,
            boosted_candidates,
            path_suggestions,
            optimization_score,
            next_components,
            pattern_suggestions,
            transitions,
            recommendations,
        }
    }

    /// Standalone path query; `max_hops` defaults to the configured ceiling.
    pub fn find_paths(&self, start: &str, end: &str, max_hops: Option<usize>) -> Vec<PathSuggestion> {
        let snapshot = self.store.snapshot();
        PathFinder::new(snapshot.graph(), self.config.beam_width)
            .find_paths(start, end, max_hops.unwrap_or(self.config.max_hops))
    }

    /// Successors of the last selected component. With nothing selected yet
    /// the start component is the only suggestion.
    fn next_components(&self, graph: &CompiledGraph, preceding: Option<&str>) -> Vec<NextComponent> {
        let Some(last) = preceding else {
            if graph.is_empty() {
                return Vec::new();
            }
            let start = self.config.start_type.as_str();
            return vec![NextComponent {
                component_type: graph.graph().resolve(start).unwrap_or_else(|| ComponentType::new(start)),
                probability: 1.0,
                observed_count: graph.frequency_of(start),
                follow_ups: graph.top_successors(start, FOLLOW_UPS),
            }];
        };

        graph
            .edges_from(last)
            .iter()
            .filter(|e| e.probability > 0.0)
            .take(self.config.max_recommendations)
            .map(|e| NextComponent {
                component_type: e.target.clone(),
                probability: e.probability,
                observed_count: e.observed_count,
                follow_ups: graph.top_successors(e.target.as_str(), FOLLOW_UPS),
            })
            .collect()
    }

    /// Catalogue patterns that extend the whole prefix.
    fn pattern_suggestions(&self, graph: &CompiledGraph, prefix: &[&str]) -> Vec<Pattern> {
        let mut matches: Vec<Pattern> = graph
            .all_patterns()
            .filter(|p| {
                p.types.len() > prefix.len()
                    && p.types.iter().zip(prefix).all(|(t, s)| t.as_str() == *s)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.frequency.cmp(&a.frequency))
                .then_with(|| a.types.cmp(&b.types))
        });
        matches.truncate(self.config.max_pattern_suggestions);
        matches
    }
}

fn transition_checks(graph: &CompiledGraph, prefix: &[&str]) -> Vec<TransitionCheck> {
    prefix
        .windows(2)
        .map(|pair| TransitionCheck {
            from: pair[0].to_string(),
            to: pair[1].to_string(),
            probability: graph.probability(pair[0], pair[1]),
        })
        .collect()
}

/// 0 for prefixes without a transition
fn prefix_score(transitions: &[TransitionCheck]) -> f64 {
    if transitions.is_empty() {
        return 0.0;
    }
    transitions
        .iter()
        .map(|t| t.probability.unwrap_or(0.0))
        .product()
}

fn recommendations(
    prefix: &[&str],
    score: f64,
    patterns: &[Pattern],
    transitions: &[TransitionCheck],
) -> Vec<String> {
    let mut out = Vec::new();

    if prefix.len() >= 2 && score < LOW_SCORE {
        out.push(format!(
            "Consider an alternative component sequence: the selected flow scores {:.2} against observed flows",
            score
        ));
    }

    if let Some(best) = patterns.first() {
        let joined: Vec<&str> = best.types.iter().map(ComponentType::as_str).collect();
        out.push(format!("Consider following pattern: {}", joined.join(" -> ")));
    }

    for t in transitions.iter().filter(|t| t.probability.is_none()) {
        out.push(format!("No observed transition: {} -> {}", t.from, t.to));
    }

    out
}

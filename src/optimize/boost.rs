//! Graph-derived confidence boosts for retrieved candidates.

use serde::{Deserialize, Serialize};

use super::FOLLOW_UPS;
use crate::config::OptimizationConfig;
use crate::graph::{CompiledGraph, ComponentType};

/// A component proposed by similarity retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateComponent {
    /// Caller-side identifier, carried through untouched
    #[serde(default)]
    pub component_id: Option<String>,
    pub component_type: String,
    /// Similarity score, expected in [0,1]
    pub base_score: f64,
}

impl CandidateComponent {
    pub fn new(component_type: impl Into<String>, base_score: f64) -> Self {
        Self {
            component_id: None,
            component_type: component_type.into(),
            base_score,
        }
    }
}

/// A candidate with its boost breakdown and what the graph knows about its type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoostedCandidate {
    pub component_id: Option<String>,
    pub component_type: String,
    pub base_score: f64,
    pub frequency_boost: f64,
    pub transition_boost: f64,
    pub boosted_score: f64,
    /// Occurrences of this type in the corpus
    pub observed_frequency: u64,
    /// Types that most often follow this one
    pub follow_ups: Vec<ComponentType>,
}

fn clip01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Blends base relevance with frequency share and transition probability.
///
/// The boosted score never drops below the (clamped) base score and never
/// exceeds 1.0; without graph signal it equals the base score.
pub struct ConfidenceBooster<'a> {
    graph: &'a CompiledGraph,
    boost_factor: f64,
    transition_threshold: f64,
}

impl<'a> ConfidenceBooster<'a> {
    pub fn new(graph: &'a CompiledGraph, config: &OptimizationConfig) -> Self {
        Self {
            graph,
            boost_factor: clip01(config.boost_factor),
            transition_threshold: config.transition_threshold,
        }
    }

    pub fn boost(&self, candidate: &CandidateComponent, preceding: Option<&str>) -> BoostedCandidate {
        let base = clip01(candidate.base_score);
        let component_type = candidate.component_type.as_str();

        let frequency_boost = clip01(self.graph.frequency_share(component_type) * self.boost_factor);

        let transition_boost = preceding
            .and_then(|prev| self.graph.probability(prev, component_type))
            .filter(|p| *p > self.transition_threshold)
            .map_or(0.0, |p| clip01(p * self.boost_factor));

        let boosted_score = (base * (1.0 + frequency_boost + transition_boost)).min(1.0);

        BoostedCandidate {
            component_id: candidate.component_id.clone(),
            component_type: candidate.component_type.clone(),
            base_score: base,
            frequency_boost,
            transition_boost,
            boosted_score,
            observed_frequency: self.graph.frequency_of(component_type),
            follow_ups: self.graph.top_successors(component_type, FOLLOW_UPS),
        }
    }
}

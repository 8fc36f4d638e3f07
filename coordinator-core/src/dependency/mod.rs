//! Dependency inference: a deterministic pattern engine combined with an
//! optional LLM refiner for ambiguous pairs, producing a [`DependencyGraph`].

mod graph;
mod hybrid;
mod pattern;
mod patterns;
mod text;

pub use graph::{critical_path, explain_dependency, validate_dependencies, ValidationReport};
pub use hybrid::{ambiguous_pairs, RefinementCache};
pub use pattern::infer as infer_patterns_only;
pub use text::word_overlap;

use crate::external::DependencyRefiner;
use crate::types::{DependencyGraph, HybridInferenceConfig, Task};

/// Owns the refinement cache across calls; the pattern engine itself is
/// stateless.
pub struct HybridInferer {
    config: HybridInferenceConfig,
    cache: RefinementCache,
}

impl HybridInferer {
    #[must_use]
    pub fn new(config: HybridInferenceConfig) -> Self {
        Self {
            config,
            cache: RefinementCache::new(),
        }
    }

    /// Runs the full hybrid pipeline and returns the resulting graph.
    /// `refiner` may be omitted even when `enable_ai_inference` is set,
    /// which is treated the same as the refiner having nothing useful to
    /// add: pattern-only results are returned.
    pub async fn infer(&self, tasks: &[Task], refiner: Option<&dyn DependencyRefiner>) -> DependencyGraph {
        let pattern_edges = pattern::infer(tasks);

        let refined = match refiner {
            Some(refiner) if self.config.enable_ai_inference => {
                let pairs = hybrid::ambiguous_pairs(tasks, &pattern_edges, &self.config);
                hybrid::refine_ambiguous_pairs(refiner, &self.cache, tasks, &pairs, &self.config).await
            }
            _ => Vec::new(),
        };

        let combined = hybrid::combine(pattern_edges, &refined, &self.config);

        DependencyGraph {
            nodes: tasks.iter().map(|t| (t.id.clone(), t.clone())).collect(),
            edges: combined,
        }
    }
}

//! Ambiguous-pair detection and the LLM-refiner combination step that
//! extends the deterministic pattern pass into the full hybrid inferer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use super::pattern::{remove_cycles, remove_transitive_edges};
use super::text::{classify, meaningful_words, shared_word_count, task_corpus};
use crate::external::{AmbiguousPair, DependencyDirection, DependencyRefiner, RefinedDependency};
use crate::types::{
    DependencyType, HybridDependency, HybridInferenceConfig, InferenceMethod, InferredDependency, Task, TaskId,
};

/// Clusters of 4+ tasks sharing >=2 meaningful keywords: force LLM review
/// even when pairs inside the cluster didn't individually look ambiguous.
const WORKFLOW_GROUP_MIN_SIZE: usize = 4;
const WORKFLOW_GROUP_MIN_SHARED: usize = 2;

struct CachedRefinement {
    result: Vec<RefinedDependency>,
    expires_at: Instant,
}

/// Caches refiner responses keyed by the stable pair-set signature, so
/// re-running inference over the same (possibly reordered) task list
/// doesn't re-call the LLM.
#[derive(Default)]
pub struct RefinementCache {
    entries: Mutex<HashMap<String, CachedRefinement>>,
}

impl RefinementCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<Vec<RefinedDependency>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, result: Vec<RefinedDependency>, ttl: Duration) {
        self.entries.lock().insert(
            key,
            CachedRefinement {
                result,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Stable signature for a task set plus its candidate pair set: sorted task
/// ids, then sorted pair ids. Insensitive to input ordering.
fn cache_key(tasks: &[Task], pairs: &[AmbiguousPair]) -> String {
    let mut task_ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    task_ids.sort_unstable();

    let mut pair_keys: Vec<String> = pairs
        .iter()
        .map(|p| {
            let mut ids = [p.task1_id.as_str(), p.task2_id.as_str()];
            ids.sort_unstable();
            format!("{}:{}", ids[0], ids[1])
        })
        .collect();
    pair_keys.sort_unstable();

    format!("{}|{}", task_ids.join(","), pair_keys.join(","))
}

fn has_edge(edges: &[HybridDependency], a: &str, b: &str) -> bool {
    edges
        .iter()
        .any(|e| e.base.dependent_task_id == a && e.base.dependency_task_id == b)
}

fn workflow_groups(tasks: &[Task]) -> Vec<HashSet<TaskId>> {
    let mut groups: Vec<HashSet<TaskId>> = Vec::new();
    let mut assigned: HashSet<TaskId> = HashSet::new();

    for seed in tasks {
        if assigned.contains(&seed.id) {
            continue;
        }
        let seed_words = meaningful_words(&task_corpus(seed));
        let mut group: HashSet<TaskId> = HashSet::from([seed.id.clone()]);
        for other in tasks {
            if other.id == seed.id {
                continue;
            }
            let other_words = meaningful_words(&task_corpus(other));
            if seed_words.intersection(&other_words).count() >= WORKFLOW_GROUP_MIN_SHARED {
                group.insert(other.id.clone());
            }
        }
        if group.len() >= WORKFLOW_GROUP_MIN_SIZE {
            for id in &group {
                assigned.insert(id.clone());
            }
            groups.push(group);
        }
    }
    groups
}

/// Step 2 of the hybrid extension: pairs that "might be related" and are
/// worth asking the refiner about.
#[must_use]
pub fn ambiguous_pairs(
    tasks: &[Task],
    pattern_edges: &[HybridDependency],
    config: &HybridInferenceConfig,
) -> Vec<AmbiguousPair> {
    let groups = workflow_groups(tasks);
    let mut pairs: Vec<AmbiguousPair> = Vec::new();
    let mut seen: HashSet<(TaskId, TaskId)> = HashSet::new();

    let mut push_pair = |a: &TaskId, b: &TaskId| {
        let key = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        if seen.insert(key) {
            pairs.push(AmbiguousPair {
                task1_id: a.clone(),
                task2_id: b.clone(),
            });
        }
    };

    for i in 0..tasks.len() {
        for j in (i + 1)..tasks.len() {
            let a = &tasks[i];
            let b = &tasks[j];

            let forward = has_edge(pattern_edges, &a.id, &b.id);
            let backward = has_edge(pattern_edges, &b.id, &a.id);

            let low_confidence_edge = pattern_edges.iter().any(|e| {
                ((e.base.dependent_task_id == a.id && e.base.dependency_task_id == b.id)
                    || (e.base.dependent_task_id == b.id && e.base.dependency_task_id == a.id))
                    && e.base.confidence < config.pattern_confidence_threshold
            });

            let conflict = forward && backward;

            let shared = shared_word_count(&task_corpus(a), &task_corpus(b));
            let keyword_overlap = shared >= config.min_shared_keywords;
            let overlapping_labels_different_phase =
                a.labels.iter().any(|label| b.labels.contains(label)) && classify(a) != classify(b);
            let maybe_related = !forward && !backward && (keyword_overlap || overlapping_labels_different_phase);

            let in_group = groups.iter().any(|g| g.contains(&a.id) && g.contains(&b.id));

            if maybe_related || low_confidence_edge || conflict || in_group {
                push_pair(&a.id, &b.id);
            }
        }
    }

    pairs
}

fn direction_to_edge(dependency_type: &str) -> DependencyType {
    match dependency_type.to_lowercase().as_str() {
        "hard" => DependencyType::Hard,
        "logical" => DependencyType::Logical,
        _ => DependencyType::Soft,
    }
}

/// Step 4: combines pattern and refiner results per the rules in the
/// hybrid inferer's configuration.
#[must_use]
pub fn combine(
    pattern_edges: Vec<HybridDependency>,
    refined: &[RefinedDependency],
    config: &HybridInferenceConfig,
) -> Vec<HybridDependency> {
    let mut by_pair: HashMap<(TaskId, TaskId), HybridDependency> =
        pattern_edges.into_iter().map(|e| (e.key(), e)).collect();

    for item in refined {
        let (dependent, dependency) = match item.dependency_direction {
            DependencyDirection::OneToTwo => (item.task1_id.clone(), item.task2_id.clone()),
            DependencyDirection::TwoToOne => (item.task2_id.clone(), item.task1_id.clone()),
            DependencyDirection::None => continue,
        };
        let key = (dependent.clone(), dependency.clone());

        if let Some(existing) = by_pair.get(&key) {
            let combined_confidence =
                ((existing.pattern_confidence + item.confidence) / 2.0 + config.combined_confidence_boost).min(1.0);
            let updated = HybridDependency {
                base: InferredDependency {
                    confidence: combined_confidence,
                    reasoning: format!("{}; refiner: {}", existing.base.reasoning, item.reasoning),
                    ..existing.base.clone()
                },
                inference_method: InferenceMethod::Both,
                pattern_confidence: existing.pattern_confidence,
                ai_confidence: item.confidence,
                ai_reasoning: Some(item.reasoning.clone()),
            };
            by_pair.insert(key, updated);
        } else if item.confidence >= config.ai_confidence_threshold {
            by_pair.insert(
                key,
                HybridDependency {
                    base: InferredDependency {
                        dependent_task_id: dependent,
                        dependency_task_id: dependency,
                        dependency_type: direction_to_edge(&item.dependency_type),
                        confidence: item.confidence,
                        reasoning: item.reasoning.clone(),
                        source: "ai".to_string(),
                    },
                    inference_method: InferenceMethod::Ai,
                    pattern_confidence: 0.0,
                    ai_confidence: item.confidence,
                    ai_reasoning: Some(item.reasoning.clone()),
                },
            );
        }
    }

    let retained: Vec<HybridDependency> = by_pair
        .into_values()
        .filter(|e| {
            matches!(e.inference_method, InferenceMethod::Both)
                || (matches!(e.inference_method, InferenceMethod::Pattern)
                    && e.base.confidence >= config.pattern_confidence_threshold)
                || (matches!(e.inference_method, InferenceMethod::Ai) && e.base.confidence >= config.ai_confidence_threshold)
        })
        .collect();

    remove_transitive_edges(remove_cycles(retained))
}

/// Runs the refiner (with its cache) over `pairs`, capped to
/// `max_ai_pairs_per_batch`. A refiner error or malformed batch falls back
/// to an empty result: pattern-only for that call.
pub async fn refine_ambiguous_pairs(
    refiner: &dyn DependencyRefiner,
    cache: &RefinementCache,
    tasks: &[Task],
    pairs: &[AmbiguousPair],
    config: &HybridInferenceConfig,
) -> Vec<RefinedDependency> {
    if pairs.is_empty() || !config.enable_ai_inference {
        return Vec::new();
    }

    let batch: Vec<AmbiguousPair> = pairs.iter().take(config.max_ai_pairs_per_batch).cloned().collect();
    if pairs.len() > config.max_ai_pairs_per_batch {
        warn!(
            total = pairs.len(),
            batch = config.max_ai_pairs_per_batch,
            "ambiguous pair set exceeds batch size, dropping the remainder for this inference pass"
        );
    }

    let key = cache_key(tasks, &batch);
    if let Some(cached) = cache.get(&key) {
        return cached;
    }

    match refiner.refine(tasks, &batch).await {
        Ok(result) => {
            cache.put(key, result.clone(), Duration::from_secs(config.cache_ttl_hours * 3600));
            result
        }
        Err(err) => {
            warn!(error = %err, "dependency refiner call failed, falling back to pattern-only for this batch");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;

    fn task(id: &str, name: &str) -> Task {
        Task::new(id, name)
    }

    #[test]
    fn unrelated_tasks_with_no_shared_keywords_are_not_ambiguous() {
        let a = task("a", "Paint the fence");
        let b = task("b", "Migrate database shards");
        let pairs = ambiguous_pairs(&[a, b], &[], &HybridInferenceConfig::default());
        assert!(pairs.is_empty());
    }

    #[test]
    fn shared_keyword_pair_is_ambiguous() {
        let a = task("a", "Implement payment gateway integration");
        let b = task("b", "Implement payment gateway retries");
        let pairs = ambiguous_pairs(&[a, b], &[], &HybridInferenceConfig::default());
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn shared_label_in_different_phases_is_ambiguous_without_keyword_overlap() {
        let mut a = task("a", "Design the onboarding wireframe");
        a.labels = std::collections::HashSet::from(["onboarding".to_string()]);
        let mut b = task("b", "Test the onboarding flow");
        b.labels = std::collections::HashSet::from(["onboarding".to_string()]);
        let pairs = ambiguous_pairs(&[a, b], &[], &HybridInferenceConfig::default());
        assert_eq!(pairs.len(), 1);
    }
}

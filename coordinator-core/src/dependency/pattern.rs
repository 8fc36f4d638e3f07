//! Deterministic pattern pass: matches the weighted keyword table against
//! every ordered task pair, then resolves cycles and transitive edges.

use std::collections::HashMap;

use chrono::Duration;

use super::patterns::{dependency_type_for, ordered_occurrence, requires_shared_word, PATTERNS};
use super::text::{classify, shared_word_count, task_corpus};
use crate::types::{HybridDependency, InferenceMethod, InferredDependency, Task, TaskId, TaskStatus};

fn is_logically_valid(dependent: &Task, dependency: &Task, pattern_name: &str) -> bool {
    if dependent.status == TaskStatus::Done && dependency.status != TaskStatus::Done {
        return false;
    }

    if requires_shared_word(pattern_name) && shared_word_count(&task_corpus(dependent), &task_corpus(dependency)) == 0
    {
        return false;
    }

    let dependency_phase = classify(dependency).phase_order();
    let dependent_phase = classify(dependent).phase_order();
    if !(dependency_phase < dependent_phase) {
        return false;
    }

    if dependency.created_at > dependent.created_at + Duration::days(7) {
        return false;
    }

    true
}

/// Best-confidence match for every ordered `(dependent, dependency)` pair
/// across all patterns.
#[must_use]
pub fn match_pairs(tasks: &[Task]) -> Vec<InferredDependency> {
    let mut best: HashMap<(TaskId, TaskId), InferredDependency> = HashMap::new();

    for dependent in tasks {
        let dependent_text = task_corpus(dependent).to_lowercase();
        for dependency in tasks {
            if dependent.id == dependency.id {
                continue;
            }
            let dependency_text = task_corpus(dependency).to_lowercase();

            for pattern in PATTERNS {
                let dependent_hits = pattern.dependent_keywords.iter().any(|kw| dependent_text.contains(kw));
                let dependency_hits = pattern.dependency_keywords.iter().any(|kw| dependency_text.contains(kw))
                    || pattern
                        .dependency_ordered_pair
                        .is_some_and(|(first, second)| ordered_occurrence(&dependency_text, first, second));
                if !(dependent_hits && dependency_hits) {
                    continue;
                }
                if !is_logically_valid(dependent, dependency, pattern.name) {
                    continue;
                }

                let key = (dependent.id.clone(), dependency.id.clone());
                let candidate = InferredDependency {
                    dependent_task_id: dependent.id.clone(),
                    dependency_task_id: dependency.id.clone(),
                    dependency_type: dependency_type_for(pattern),
                    confidence: pattern.confidence,
                    reasoning: format!("matched pattern '{}'", pattern.name),
                    source: "pattern".to_string(),
                };

                best.entry(key)
                    .and_modify(|existing| {
                        if candidate.confidence > existing.confidence {
                            *existing = candidate.clone();
                        }
                    })
                    .or_insert(candidate);
            }
        }
    }

    best.into_values().collect()
}

fn forward_adjacency(edges: &[HybridDependency]) -> HashMap<TaskId, Vec<usize>> {
    let mut adj: HashMap<TaskId, Vec<usize>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        adj.entry(edge.base.dependency_task_id.clone()).or_default().push(idx);
    }
    adj
}

fn find_one_cycle(edges: &[HybridDependency]) -> Option<Vec<usize>> {
    let adj = forward_adjacency(edges);
    let mut visited: std::collections::HashSet<TaskId> = std::collections::HashSet::new();
    let mut stack: Vec<(TaskId, usize)> = Vec::new();

    fn dfs(
        node: &TaskId,
        edges: &[HybridDependency],
        adj: &HashMap<TaskId, Vec<usize>>,
        visited: &mut std::collections::HashSet<TaskId>,
        stack: &mut Vec<(TaskId, usize)>,
    ) -> Option<Vec<usize>> {
        if let Some(pos) = stack.iter().position(|(n, _)| n == node) {
            return Some(stack[pos..].iter().map(|(_, e)| *e).collect());
        }
        if visited.contains(node) {
            return None;
        }
        visited.insert(node.clone());
        if let Some(edge_indices) = adj.get(node) {
            for &edge_idx in edge_indices {
                let next = edges[edge_idx].base.dependent_task_id.clone();
                stack.push((node.clone(), edge_idx));
                if let Some(cycle) = dfs(&next, edges, adj, visited, stack) {
                    return Some(cycle);
                }
                stack.pop();
            }
        }
        None
    }

    for edge in edges {
        let start = edge.base.dependency_task_id.clone();
        if let Some(cycle) = dfs(&start, edges, &adj, &mut visited, &mut stack) {
            return Some(cycle);
        }
        visited.clear();
        stack.clear();
    }
    None
}

/// Deletes the lowest-confidence edge in each detected cycle, repeating
/// until the graph is acyclic.
pub fn remove_cycles(mut edges: Vec<HybridDependency>) -> Vec<HybridDependency> {
    loop {
        let Some(cycle) = find_one_cycle(&edges) else {
            return edges;
        };
        let weakest = cycle
            .iter()
            .min_by(|&&a, &&b| edges[a].base.confidence.partial_cmp(&edges[b].base.confidence).unwrap())
            .copied();
        if let Some(idx) = weakest {
            edges.remove(idx);
        } else {
            return edges;
        }
    }
}

/// Deletes edge `A->C` (dependency C, dependent A) when an intermediate `B`
/// provides both hops, unless the direct edge is `hard`.
#[must_use]
pub fn remove_transitive_edges(edges: Vec<HybridDependency>) -> Vec<HybridDependency> {
    let reach: HashMap<TaskId, Vec<TaskId>> = {
        let mut adj: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for edge in &edges {
            adj.entry(edge.base.dependency_task_id.clone())
                .or_default()
                .push(edge.base.dependent_task_id.clone());
        }
        adj
    };

    let reachable_excluding_direct = |from: &TaskId, to: &TaskId| -> bool {
        let mut visited = std::collections::HashSet::new();
        let mut queue: std::collections::VecDeque<TaskId> = reach
            .get(from)
            .into_iter()
            .flatten()
            .filter(|n| *n != to)
            .cloned()
            .collect();
        while let Some(node) = queue.pop_front() {
            if node == *to {
                return true;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            if let Some(neighbors) = reach.get(&node) {
                queue.extend(neighbors.iter().cloned());
            }
        }
        false
    };

    edges
        .into_iter()
        .filter(|edge| {
            if matches!(edge.base.dependency_type, crate::types::DependencyType::Hard) {
                return true;
            }
            !reachable_excluding_direct(&edge.base.dependency_task_id, &edge.base.dependent_task_id)
        })
        .collect()
}

#[must_use]
pub fn to_hybrid(edges: Vec<InferredDependency>) -> Vec<HybridDependency> {
    edges
        .into_iter()
        .map(|base| HybridDependency {
            pattern_confidence: base.confidence,
            base,
            inference_method: InferenceMethod::Pattern,
            ai_confidence: 0.0,
            ai_reasoning: None,
        })
        .collect()
}

/// Runs the full deterministic pipeline: match, dedupe (already done in
/// `match_pairs`), remove cycles, remove transitive edges.
#[must_use]
pub fn infer(tasks: &[Task]) -> Vec<HybridDependency> {
    let matched = to_hybrid(match_pairs(tasks));
    let acyclic = remove_cycles(matched);
    remove_transitive_edges(acyclic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn task(id: &str, name: &str) -> Task {
        Task::new(id, name)
    }

    #[test]
    fn pattern_ordering_produces_expected_chain() {
        let t1 = task("t1", "Design DB schema");
        let t2 = task("t2", "Implement User API");
        let t3 = task("t3", "Test User API");
        let t4 = task("t4", "Deploy to Production");

        let edges = infer(&[t1.clone(), t2.clone(), t3.clone(), t4.clone()]);
        let has_edge = |dependent: &str, dependency: &str| {
            edges
                .iter()
                .any(|e| e.base.dependent_task_id == dependent && e.base.dependency_task_id == dependency)
        };

        assert!(has_edge("t2", "t1"));
        assert!(has_edge("t3", "t2"));
        assert!(has_edge("t4", "t3"));
    }

    #[test]
    fn cycle_is_broken_by_removing_lowest_confidence_edge() {
        let a = task("a", "A");
        let b = task("b", "B");
        let c = task("c", "C");

        let edges = vec![
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "b".into(),
                    dependency_task_id: "a".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.9,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.9,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "c".into(),
                    dependency_task_id: "b".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.85,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.85,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "a".into(),
                    dependency_task_id: "c".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.7,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.7,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
        ];

        let _ = (&a, &b, &c);
        let result = remove_cycles(edges);
        assert_eq!(result.len(), 2);
        assert!(!result
            .iter()
            .any(|e| e.base.dependent_task_id == "a" && e.base.dependency_task_id == "c"));
    }

    #[test]
    fn non_hard_transitive_edge_is_removed() {
        let a = task("a", "Alpha task");
        let b = task("b", "Bravo task");
        let c = task("c", "Charlie task");

        let edges = vec![
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "b".into(),
                    dependency_task_id: "a".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.9,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.9,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "c".into(),
                    dependency_task_id: "b".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.9,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.9,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
            HybridDependency {
                base: InferredDependency {
                    dependent_task_id: "c".into(),
                    dependency_task_id: "a".into(),
                    dependency_type: crate::types::DependencyType::Soft,
                    confidence: 0.6,
                    reasoning: String::new(),
                    source: "pattern".into(),
                },
                inference_method: InferenceMethod::Pattern,
                pattern_confidence: 0.6,
                ai_confidence: 0.0,
                ai_reasoning: None,
            },
        ];

        let _ = (&a, &b, &c, Priority::Low);
        let result = remove_transitive_edges(edges);
        assert_eq!(result.len(), 2);
    }
}

//! Graph derivations over a built `DependencyGraph`: critical path and
//! dependency validation.

use std::collections::{HashMap, VecDeque};

use super::text::classify;
use crate::types::{DependencyGraph, HybridInferenceConfig, InferenceMethod, TaskClassification, TaskId};

/// Longest weighted path (by `estimated_hours`, fallback 1.0) through the
/// graph, following the dependency-before-dependent direction.
#[must_use]
pub fn critical_path(graph: &DependencyGraph) -> Vec<TaskId> {
    let forward = graph.forward_adjacency();
    let reverse = graph.reverse_adjacency();

    let mut indegree: HashMap<&TaskId, usize> = graph.nodes.keys().map(|id| (id, 0)).collect();
    for dependents in forward.values() {
        for dependent in dependents {
            if let Some(count) = indegree.get_mut(dependent) {
                *count += 1;
            }
        }
    }

    let mut queue: VecDeque<TaskId> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| (*id).clone())
        .collect();
    let mut order: Vec<TaskId> = Vec::with_capacity(graph.nodes.len());
    let mut remaining = indegree.iter().map(|(id, c)| ((*id).clone(), *c)).collect::<HashMap<_, _>>();

    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        if let Some(dependents) = forward.get(&node) {
            for dependent in dependents {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
    }

    let weight = |id: &TaskId| graph.nodes.get(id).map_or(1.0, |t| if t.estimated_hours > 0.0 { t.estimated_hours } else { 1.0 });

    let mut dp: HashMap<TaskId, f64> = HashMap::new();
    let mut parent: HashMap<TaskId, TaskId> = HashMap::new();

    for node in &order {
        let own_weight = weight(node);
        let best_predecessor = reverse
            .get(node)
            .into_iter()
            .flatten()
            .max_by(|a, b| dp.get(a).copied().unwrap_or(0.0).partial_cmp(&dp.get(b).copied().unwrap_or(0.0)).unwrap());

        match best_predecessor {
            Some(pred) => {
                dp.insert(node.clone(), dp.get(pred).copied().unwrap_or(0.0) + own_weight);
                parent.insert(node.clone(), pred.clone());
            }
            None => {
                dp.insert(node.clone(), own_weight);
            }
        }
    }

    let Some(end) = dp.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).map(|(id, _)| id.clone()) else {
        return Vec::new();
    };

    let mut path = vec![end.clone()];
    let mut current = end;
    while let Some(pred) = parent.get(&current) {
        path.push(pred.clone());
        current = pred.clone();
    }
    path.reverse();
    path
}

/// Diagnostic trace of why `dependent_id -> dependency_id` exists: which
/// method(s) produced it, and at what confidence. Does not affect graph
/// construction.
#[must_use]
pub fn explain_dependency(dependent_id: &str, dependency_id: &str, graph: &DependencyGraph) -> String {
    let Some(edge) = graph
        .edges
        .iter()
        .find(|e| e.base.dependent_task_id == dependent_id && e.base.dependency_task_id == dependency_id)
    else {
        return "dependency not found in graph".to_string();
    };

    let method = match edge.inference_method {
        InferenceMethod::Pattern => "pattern",
        InferenceMethod::Ai => "ai",
        InferenceMethod::Both => "both",
    };
    let mut explanation = format!("dependency identified by: {method}\n");

    if edge.pattern_confidence > 0.0 {
        explanation += &format!("pattern match ({:.0}% confidence): {}\n", edge.pattern_confidence * 100.0, edge.base.reasoning);
    }
    if let Some(ai_reasoning) = &edge.ai_reasoning {
        explanation += &format!("ai analysis ({:.0}% confidence): {ai_reasoning}\n", edge.ai_confidence * 100.0);
    }
    explanation += &format!("overall confidence: {:.0}%", edge.base.confidence * 100.0);
    explanation
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Checks cycles, missing-mandatory edges (deployment lacking a test
/// dependency), long dependency chains, and isolated tasks.
#[must_use]
pub fn validate_dependencies(graph: &DependencyGraph, config: &HybridInferenceConfig) -> ValidationReport {
    let mut report = ValidationReport {
        node_count: graph.nodes.len(),
        edge_count: graph.edges.len(),
        ..Default::default()
    };

    if graph.has_cycle() {
        report.issues.push("dependency graph contains a cycle".to_string());
    }

    let reverse = graph.reverse_adjacency();
    for task in graph.nodes.values() {
        if classify(task) == TaskClassification::Deployment {
            let has_test_dependency = reverse
                .get(&task.id)
                .into_iter()
                .flatten()
                .any(|dep_id| graph.nodes.get(dep_id).is_some_and(|dep| classify(dep) == TaskClassification::Testing));
            if !has_test_dependency {
                report.issues.push(format!("deployment task '{}' lacking test dependency", task.id));
            }
        }
    }

    let forward = graph.forward_adjacency();
    for id in graph.nodes.keys() {
        let has_forward = forward.get(id).is_some_and(|v| !v.is_empty());
        let has_backward = reverse.get(id).is_some_and(|v| !v.is_empty());
        if !has_forward && !has_backward {
            report.warnings.push(format!("task '{id}' is isolated (no dependency edges)"));
        }
    }

    let path = critical_path(graph);
    if path.len() > config.max_dependency_chain_length {
        report.warnings.push(format!(
            "dependency chain of length {} exceeds configured maximum {}",
            path.len(),
            config.max_dependency_chain_length
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DependencyType, HybridDependency, InferenceMethod, InferredDependency, Task};

    fn edge(dependent: &str, dependency: &str, hours_owner: &mut DependencyGraph, hours: f64) {
        hours_owner.nodes.entry(dependent.to_string()).or_insert_with(|| {
            let mut t = Task::new(dependent, dependent);
            t.estimated_hours = hours;
            t
        });
        hours_owner.edges.push(HybridDependency {
            base: InferredDependency {
                dependent_task_id: dependent.to_string(),
                dependency_task_id: dependency.to_string(),
                dependency_type: DependencyType::Hard,
                confidence: 0.9,
                reasoning: String::new(),
                source: "pattern".to_string(),
            },
            inference_method: InferenceMethod::Pattern,
            pattern_confidence: 0.9,
            ai_confidence: 0.0,
            ai_reasoning: None,
        });
    }

    #[test]
    fn critical_path_sums_estimated_hours_along_the_chain() {
        let mut graph = DependencyGraph::new();
        graph.nodes.insert("a".into(), {
            let mut t = Task::new("a", "A");
            t.estimated_hours = 4.0;
            t
        });
        edge("b", "a", &mut graph, 4.0);
        edge("c", "b", &mut graph, 4.0);
        edge("d", "c", &mut graph, 4.0);

        let path = critical_path(&graph);
        assert_eq!(path, vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]);
    }

    #[test]
    fn explain_dependency_reports_method_and_confidence() {
        let mut graph = DependencyGraph::new();
        edge("b", "a", &mut graph, 4.0);
        let explanation = explain_dependency("b", "a", &graph);
        assert!(explanation.contains("pattern"));
        assert!(explanation.contains("90%"));
    }

    #[test]
    fn explain_dependency_reports_missing_edge() {
        let graph = DependencyGraph::new();
        assert_eq!(explain_dependency("x", "y", &graph), "dependency not found in graph");
    }
}

//! Core data model structs: tasks, events, decisions, outcomes, profiles,
//! patterns, and the dependency graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::{DependencyType, DependentTaskKind, InferenceMethod, Priority, TaskStatus};

pub type TaskId = String;

/// A unit of work tracked by the coordinator. Created by the Kanban
/// integration; mutated only through explicit state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub dependencies: Vec<TaskId>,
    pub labels: HashSet<String>,
}

impl Task {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            due_date: None,
            estimated_hours: 0.0,
            actual_hours: 0.0,
            dependencies: Vec::new(),
            labels: HashSet::new(),
        }
    }
}

/// A bus event. `event_id` is assigned from a process-local monotonic
/// counter concatenated with a timestamp, so ids sort lexically in
/// publication order within a process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub source: String,
    pub data: HashMap<String, Value>,
    pub metadata: Option<HashMap<String, Value>>,
}

/// An immutable architectural decision recorded against a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: u64,
    pub task_id: TaskId,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub what: String,
    pub why: String,
    pub impact: String,
}

/// An open-ended structured record of what an agent implemented for a task
/// (APIs, schema, endpoints, patterns). `_stored_at` is attached by the
/// context store, not supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationRecord {
    pub task_id: TaskId,
    pub fields: HashMap<String, Value>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentTask {
    pub task_id: TaskId,
    pub task_name: String,
    pub expected_interface: String,
    pub dependency_type: DependentTaskKind,
}

/// A completed (or failed) task run, the unit the memory system learns from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub agent_id: String,
    pub task_name: String,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub success: bool,
    pub blockers: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskOutcome {
    /// `min(est,act)/max(est,act)`, 0 if `est == 0`.
    #[must_use]
    pub fn estimation_accuracy(&self) -> f64 {
        if self.estimated_hours == 0.0 {
            return 0.0;
        }
        let (lo, hi) = if self.estimated_hours < self.actual_hours {
            (self.estimated_hours, self.actual_hours)
        } else {
            (self.actual_hours, self.estimated_hours)
        };
        if hi == 0.0 {
            0.0
        } else {
            lo / hi
        }
    }
}

/// An agent's running performance profile, updated incrementally by
/// `record_task_completion` via exponential moving averages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub blocked_tasks: u64,
    pub skill_success_rates: HashMap<String, f64>,
    pub average_estimation_accuracy: f64,
    pub common_blockers: HashMap<String, u64>,
    /// Reserved for future use; not populated by any current operation.
    pub peak_performance_hours: Vec<u32>,
}

impl AgentProfile {
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            blocked_tasks: 0,
            skill_success_rates: HashMap::new(),
            average_estimation_accuracy: 0.0,
            common_blockers: HashMap::new(),
            peak_performance_hours: Vec::new(),
        }
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }

    #[must_use]
    pub fn blockage_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.blocked_tasks as f64 / self.total_tasks as f64
        }
    }
}

/// A learned duration/outcome pattern keyed by a sorted-label bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPattern {
    pub pattern_type: String,
    pub task_labels: Vec<String>,
    pub recent_durations: Vec<f64>,
    pub success_rate: f64,
    pub common_blockers: HashMap<String, u64>,
    pub prerequisites: Vec<String>,
    pub best_agents: Vec<String>,
}

impl TaskPattern {
    pub const MAX_SAMPLES: usize = 100;

    #[must_use]
    pub fn new(pattern_type: impl Into<String>, task_labels: Vec<String>) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            task_labels,
            recent_durations: Vec::new(),
            success_rate: 0.0,
            common_blockers: HashMap::new(),
            prerequisites: Vec::new(),
            best_agents: Vec::new(),
        }
    }

    #[must_use]
    pub fn median_duration(&self) -> f64 {
        if self.recent_durations.is_empty() {
            return 0.0;
        }
        let mut sorted = self.recent_durations.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    #[must_use]
    pub fn average_duration(&self) -> f64 {
        if self.recent_durations.is_empty() {
            0.0
        } else {
            self.recent_durations.iter().sum::<f64>() / self.recent_durations.len() as f64
        }
    }

    /// Appends a duration sample, trimming the oldest once the sliding
    /// window exceeds `MAX_SAMPLES`.
    pub fn push_duration(&mut self, hours: f64) {
        self.recent_durations.push(hours);
        if self.recent_durations.len() > Self::MAX_SAMPLES {
            let excess = self.recent_durations.len() - Self::MAX_SAMPLES;
            self.recent_durations.drain(0..excess);
        }
    }
}

/// A single inferred dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredDependency {
    pub dependent_task_id: TaskId,
    pub dependency_task_id: TaskId,
    pub dependency_type: DependencyType,
    pub confidence: f64,
    pub reasoning: String,
    pub source: String,
}

/// Extends `InferredDependency` with the hybrid inferer's pattern/AI
/// provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridDependency {
    #[serde(flatten)]
    pub base: InferredDependency,
    pub inference_method: InferenceMethod,
    pub pattern_confidence: f64,
    pub ai_confidence: f64,
    pub ai_reasoning: Option<String>,
}

impl HybridDependency {
    #[must_use]
    pub fn key(&self) -> (TaskId, TaskId) {
        (
            self.base.dependent_task_id.clone(),
            self.base.dependency_task_id.clone(),
        )
    }
}

/// The full dependency graph for a project: nodes plus inferred edges.
/// Adjacency is derived on demand rather than stored redundantly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: HashMap<TaskId, Task>,
    pub edges: Vec<HybridDependency>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn forward_adjacency(&self) -> HashMap<TaskId, Vec<TaskId>> {
        let mut adj: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for edge in &self.edges {
            adj.entry(edge.base.dependency_task_id.clone())
                .or_default()
                .push(edge.base.dependent_task_id.clone());
        }
        adj
    }

    #[must_use]
    pub fn reverse_adjacency(&self) -> HashMap<TaskId, Vec<TaskId>> {
        let mut adj: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for edge in &self.edges {
            adj.entry(edge.base.dependent_task_id.clone())
                .or_default()
                .push(edge.base.dependency_task_id.clone());
        }
        adj
    }

    /// DFS cycle check over the dependency edges (dependency -> dependent
    /// direction, i.e. the direction work must complete in).
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let adj = self.forward_adjacency();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut in_stack: HashSet<&str> = HashSet::new();

        fn visit<'a>(
            node: &'a str,
            adj: &'a HashMap<TaskId, Vec<TaskId>>,
            visited: &mut HashSet<&'a str>,
            in_stack: &mut HashSet<&'a str>,
        ) -> bool {
            if in_stack.contains(node) {
                return true;
            }
            if visited.contains(node) {
                return false;
            }
            visited.insert(node);
            in_stack.insert(node);
            if let Some(neighbors) = adj.get(node) {
                for next in neighbors {
                    if visit(next.as_str(), adj, visited, in_stack) {
                        return true;
                    }
                }
            }
            in_stack.remove(node);
            false
        }

        for node in self.nodes.keys() {
            if visit(node.as_str(), &adj, &mut visited, &mut in_stack) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimation_accuracy_handles_zero_estimate() {
        let outcome = TaskOutcome {
            task_id: "t1".into(),
            agent_id: "a1".into(),
            task_name: "x".into(),
            estimated_hours: 0.0,
            actual_hours: 5.0,
            success: true,
            blockers: vec![],
            started_at: None,
            completed_at: None,
        };
        assert_eq!(outcome.estimation_accuracy(), 0.0);
    }

    #[test]
    fn estimation_accuracy_is_ratio_of_min_over_max() {
        let outcome = TaskOutcome {
            task_id: "t1".into(),
            agent_id: "a1".into(),
            task_name: "x".into(),
            estimated_hours: 5.0,
            actual_hours: 6.0,
            success: true,
            blockers: vec![],
            started_at: None,
            completed_at: None,
        };
        assert!((outcome.estimation_accuracy() - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn task_pattern_window_is_bounded() {
        let mut pattern = TaskPattern::new("impl", vec!["api".to_string()]);
        for i in 0..150 {
            pattern.push_duration(i as f64);
        }
        assert_eq!(pattern.recent_durations.len(), TaskPattern::MAX_SAMPLES);
        assert_eq!(pattern.recent_durations[0], 50.0);
    }

    #[test]
    fn median_duration_handles_even_and_odd_counts() {
        let mut pattern = TaskPattern::new("impl", vec![]);
        pattern.push_duration(2.0);
        pattern.push_duration(4.0);
        assert_eq!(pattern.median_duration(), 3.0);
        pattern.push_duration(6.0);
        assert_eq!(pattern.median_duration(), 4.0);
    }

    #[test]
    fn dependency_graph_detects_cycles() {
        let mut graph = DependencyGraph::new();
        graph.nodes.insert("a".into(), Task::new("a", "A"));
        graph.nodes.insert("b".into(), Task::new("b", "B"));
        graph.edges.push(HybridDependency {
            base: InferredDependency {
                dependent_task_id: "b".into(),
                dependency_task_id: "a".into(),
                dependency_type: DependencyType::Hard,
                confidence: 0.9,
                reasoning: "a before b".into(),
                source: "pattern".into(),
            },
            inference_method: InferenceMethod::Pattern,
            pattern_confidence: 0.9,
            ai_confidence: 0.0,
            ai_reasoning: None,
        });
        assert!(!graph.has_cycle());

        graph.edges.push(HybridDependency {
            base: InferredDependency {
                dependent_task_id: "a".into(),
                dependency_task_id: "b".into(),
                dependency_type: DependencyType::Soft,
                confidence: 0.5,
                reasoning: "b before a".into(),
                source: "pattern".into(),
            },
            inference_method: InferenceMethod::Pattern,
            pattern_confidence: 0.5,
            ai_confidence: 0.0,
            ai_reasoning: None,
        });
        assert!(graph.has_cycle());
    }
}

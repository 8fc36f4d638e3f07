//! The four memory tiers. Each is an independent in-memory map owned by
//! [`super::Memory`]; nothing here touches persistence directly.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{AgentProfile, Event, Task, TaskOutcome, TaskPattern};

#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub task: Task,
    pub started_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

/// Short-lived state about currently active tasks and the project
/// snapshot, refreshed by the coordinator on every project refresh.
#[derive(Debug, Default)]
pub struct Working {
    pub active_tasks: HashMap<String, ActiveTask>,
    pub recent_events: Vec<Event>,
    pub all_tasks: Vec<Task>,
}

/// Record of what happened: completed (or failed) task runs.
#[derive(Debug, Default)]
pub struct Episodic {
    pub outcomes: Vec<TaskOutcome>,
    pub timeline: HashMap<NaiveDate, Vec<TaskOutcome>>,
}

impl Episodic {
    pub fn push(&mut self, outcome: TaskOutcome) {
        let date = outcome.completed_at.unwrap_or_else(Utc::now).date_naive();
        self.timeline.entry(date).or_default().push(outcome.clone());
        self.outcomes.push(outcome);
    }
}

/// Distilled facts: agent profiles and task patterns.
#[derive(Debug, Default)]
pub struct Semantic {
    pub agent_profiles: HashMap<String, AgentProfile>,
    pub task_patterns: HashMap<String, TaskPattern>,
    pub success_factors: HashMap<String, f64>,
}

/// Reserved for future use; not written by any current operation.
#[derive(Debug, Default)]
pub struct Procedural {
    pub workflows: HashMap<String, serde_json::Value>,
    pub strategies: HashMap<String, serde_json::Value>,
    pub optimizations: HashMap<String, serde_json::Value>,
}

/// `sorted(labels).join("_")`, used as the index into `task_patterns`.
#[must_use]
pub fn pattern_key(task: &Task) -> String {
    let mut labels: Vec<&String> = task.labels.iter().collect();
    labels.sort();
    if labels.is_empty() {
        "untagged".to_string()
    } else {
        labels.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("_")
    }
}

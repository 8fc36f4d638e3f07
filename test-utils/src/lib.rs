//! # Test Utilities
//!
//! Shared test fixtures for `coordinator-core` and its storage backends.
//!
//! Provides:
//! - Task, outcome, event, and decision builders
//! - Dependency-chain fixtures for the hybrid inferer
//! - Agent profile fixtures for the prediction pipeline

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coordinator_core::types::{AgentProfile, Decision, Event, Priority, Task, TaskOutcome, TaskStatus};

/// A task with sensible defaults, ready to be customized by the caller.
#[must_use]
pub fn create_test_task(id: &str, name: &str) -> Task {
    Task::new(id, name)
}

/// A task with an explicit label set, useful for pattern-key and
/// dependency-keyword tests.
#[must_use]
pub fn create_labeled_task(id: &str, name: &str, labels: &[&str]) -> Task {
    let mut task = Task::new(id, name);
    task.labels = labels.iter().map(|s| (*s).to_string()).collect();
    task
}

/// A chain `a -> b -> c -> ...` where each task explicitly depends on the
/// previous one, in declaration order.
#[must_use]
pub fn create_dependency_chain(ids: &[&str]) -> Vec<Task> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let mut task = Task::new(*id, format!("Task {id}"));
            if i > 0 {
                task.dependencies.push(ids[i - 1].to_string());
            }
            task
        })
        .collect()
}

/// A completed (or failed) outcome for `task`, as if reported by `agent_id`.
#[must_use]
pub fn create_completed_outcome(task: &Task, agent_id: &str, success: bool, actual_hours: f64) -> TaskOutcome {
    TaskOutcome {
        task_id: task.id.clone(),
        agent_id: agent_id.to_string(),
        task_name: task.name.clone(),
        estimated_hours: task.estimated_hours,
        actual_hours,
        success,
        blockers: Vec::new(),
        started_at: Some(Utc::now()),
        completed_at: Some(Utc::now()),
    }
}

/// An outcome blocked by the given reasons.
#[must_use]
pub fn create_blocked_outcome(task: &Task, agent_id: &str, blockers: &[&str]) -> TaskOutcome {
    let mut outcome = create_completed_outcome(task, agent_id, false, task.estimated_hours);
    outcome.blockers = blockers.iter().map(|s| (*s).to_string()).collect();
    outcome
}

/// An agent profile with a fixed task history, useful for prediction tests
/// that need a non-default skill/accuracy baseline.
#[must_use]
pub fn create_agent_profile(agent_id: &str, total_tasks: u64, successful_tasks: u64) -> AgentProfile {
    let mut profile = AgentProfile::new(agent_id);
    profile.total_tasks = total_tasks;
    profile.successful_tasks = successful_tasks;
    profile.failed_tasks = total_tasks - successful_tasks;
    profile
}

/// A bus event with a fixed type and a small data payload.
#[must_use]
pub fn create_test_event(event_type: &str, source: &str, data: HashMap<String, serde_json::Value>) -> Event {
    Event {
        event_id: format!("test-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
        timestamp: Utc::now(),
        event_type: event_type.to_string(),
        source: source.to_string(),
        data,
        metadata: None,
    }
}

/// An architectural decision tied to a task.
#[must_use]
pub fn create_test_decision(decision_id: u64, task_id: &str, agent_id: &str, what: &str, why: &str) -> Decision {
    Decision {
        decision_id,
        task_id: task_id.to_string(),
        agent_id: agent_id.to_string(),
        timestamp: Utc::now(),
        what: what.to_string(),
        why: why.to_string(),
        impact: String::new(),
    }
}

/// A task due at a fixed offset from now, for overdue/upcoming edge cases.
#[must_use]
pub fn create_task_due_in(id: &str, name: &str, offset: chrono::Duration) -> Task {
    let mut task = Task::new(id, name);
    task.due_date = Some(Utc::now() + offset);
    task
}

/// Marks a task as assigned and in progress.
#[must_use]
pub fn create_in_progress_task(id: &str, name: &str, agent_id: &str) -> Task {
    let mut task = Task::new(id, name);
    task.status = TaskStatus::InProgress;
    task.assigned_to = Some(agent_id.to_string());
    task
}

/// A high-priority task, for ranking tests.
#[must_use]
pub fn create_urgent_task(id: &str, name: &str) -> Task {
    let mut task = Task::new(id, name);
    task.priority = Priority::Urgent;
    task
}

#[must_use]
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_chain_links_each_task_to_its_predecessor() {
        let chain = create_dependency_chain(&["a", "b", "c"]);
        assert!(chain[0].dependencies.is_empty());
        assert_eq!(chain[1].dependencies, vec!["a".to_string()]);
        assert_eq!(chain[2].dependencies, vec!["b".to_string()]);
    }

    #[test]
    fn agent_profile_fixture_keeps_totals_consistent() {
        let profile = create_agent_profile("agent1", 10, 7);
        assert_eq!(profile.total_tasks, profile.successful_tasks + profile.failed_tasks);
    }
}

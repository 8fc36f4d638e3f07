//! Context store: implementation records, decisions, pattern index, and the
//! baseline keyword-pair dependency inference used before the hybrid
//! inferer (§4.6) refines it further.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::events::EventBus;
use crate::persistence::{collections, PersistenceBackend};
use crate::resilience::with_fallback;
use crate::types::{Decision, DependentTask, EventTypes, ImplementationRecord, Priority, Task, TaskId};

/// Keyword pairs for the baseline inferer: a task matching a left-side
/// keyword depends on any task matching the paired right-side keyword.
const DEPENDENCY_KEYWORD_PAIRS: &[(&[&str], &[&str])] = &[
    (&["frontend", "ui", "client"], &["backend", "api", "server"]),
    (&["test", "spec"], &["implement", "feature", "api"]),
    (&["integration", "e2e"], &["component", "service", "module"]),
    (&["docs", "documentation"], &["implement", "feature"]),
];

/// Bundle assembled for a task about to be worked on: everything a fresh
/// agent needs to pick up where dependencies left off.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskContext {
    pub previous_implementations: HashMap<TaskId, HashMap<String, Value>>,
    pub dependent_tasks: Vec<DependentTask>,
    pub related_patterns: HashMap<String, Vec<Value>>,
    pub architectural_decisions: Vec<Decision>,
}

#[derive(Debug, Clone)]
struct PatternEntry {
    task_id: TaskId,
    pattern: Value,
    recorded_at: chrono::DateTime<Utc>,
}

pub struct ContextStore {
    implementations: RwLock<HashMap<TaskId, ImplementationRecord>>,
    pattern_index: RwLock<HashMap<String, Vec<PatternEntry>>>,
    dependent_tasks: RwLock<HashMap<TaskId, Vec<DependentTask>>>,
    decisions: RwLock<Vec<Decision>>,
    decision_counter: AtomicU64,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    events: Option<Arc<EventBus>>,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            implementations: RwLock::new(HashMap::new()),
            pattern_index: RwLock::new(HashMap::new()),
            dependent_tasks: RwLock::new(HashMap::new()),
            decisions: RwLock::new(Vec::new()),
            decision_counter: AtomicU64::new(0),
            persistence: None,
            events: None,
        }
    }

    #[must_use]
    pub fn with_persistence(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.persistence = Some(backend);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn add_implementation(&self, task_id: &str, details: HashMap<String, Value>) {
        let record = ImplementationRecord {
            task_id: task_id.to_string(),
            fields: details.clone(),
            stored_at: Utc::now(),
        };

        if let Some(Value::Array(patterns)) = details.get("patterns") {
            let mut index = self.pattern_index.write().await;
            for pattern in patterns {
                if let Some(pattern_type) = pattern.get("type").and_then(Value::as_str) {
                    index.entry(pattern_type.to_string()).or_default().push(PatternEntry {
                        task_id: task_id.to_string(),
                        pattern: pattern.clone(),
                        recorded_at: Utc::now(),
                    });
                }
            }
        }

        self.implementations.write().await.insert(task_id.to_string(), record.clone());

        if let Some(backend) = &self.persistence {
            let backend = backend.clone();
            let task_id = task_id.to_string();
            let value = serde_json::to_value(&record).unwrap_or(Value::Null);
            with_fallback(
                || async {
                    backend
                        .store(collections::IMPLEMENTATIONS, &task_id, value)
                        .await
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                },
                || async {
                    warn!("failed to persist implementation record, continuing in-memory only");
                },
            )
            .await;
        }

        if let Some(events) = &self.events {
            events
                .publish(
                    EventTypes::IMPLEMENTATION_FOUND,
                    "context_store",
                    HashMap::from([("task_id".to_string(), Value::from(task_id))]),
                    None,
                    true,
                )
                .await;
        }
    }

    pub async fn add_dependency(&self, task_id: &str, dependent: DependentTask) {
        self.dependent_tasks
            .write()
            .await
            .entry(task_id.to_string())
            .or_default()
            .push(dependent);
    }

    pub async fn log_decision(
        &self,
        agent_id: &str,
        task_id: &str,
        what: &str,
        why: &str,
        impact: &str,
    ) -> Decision {
        let decision = Decision {
            decision_id: self.decision_counter.fetch_add(1, Ordering::SeqCst),
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            timestamp: Utc::now(),
            what: what.to_string(),
            why: why.to_string(),
            impact: impact.to_string(),
        };

        self.decisions.write().await.push(decision.clone());

        if let Some(backend) = &self.persistence {
            let backend = backend.clone();
            let key = format!("{}_{}", decision.task_id, decision.decision_id);
            let value = serde_json::to_value(&decision).unwrap_or(Value::Null);
            with_fallback(
                || async {
                    backend
                        .store(collections::DECISIONS, &key, value)
                        .await
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                },
                || async {
                    warn!("failed to persist decision, continuing in-memory only");
                },
            )
            .await;
        }

        if let Some(events) = &self.events {
            events
                .publish(
                    EventTypes::DECISION_LOGGED,
                    "context_store",
                    HashMap::from([("task_id".to_string(), Value::from(task_id))]),
                    None,
                    true,
                )
                .await;
        }

        decision
    }

    pub async fn get_context(&self, task_id: &str, dependency_task_ids: &[TaskId]) -> TaskContext {
        let implementations = self.implementations.read().await;
        let previous_implementations = dependency_task_ids
            .iter()
            .filter_map(|id| implementations.get(id).map(|record| (id.clone(), record.fields.clone())))
            .collect();

        let dependent_tasks = self
            .dependent_tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or_default();

        let related_patterns = {
            let index = self.pattern_index.read().await;
            index
                .iter()
                .map(|(pattern_type, entries)| {
                    let mut sorted = entries.clone();
                    sorted.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
                    let recent = sorted.into_iter().take(3).map(|e| e.pattern).collect();
                    (pattern_type.clone(), recent)
                })
                .collect()
        };

        let architectural_decisions = {
            let decisions = self.decisions.read().await;
            let mut matched: Vec<Decision> = decisions
                .iter()
                .filter(|d| dependency_task_ids.contains(&d.task_id) || d.impact.contains(task_id))
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            matched.truncate(5);
            matched
        };

        let context = TaskContext {
            previous_implementations,
            dependent_tasks,
            related_patterns,
            architectural_decisions,
        };

        if let Some(events) = &self.events {
            events
                .publish(
                    EventTypes::CONTEXT_UPDATED,
                    "context_store",
                    HashMap::from([
                        ("task_id".to_string(), Value::from(task_id)),
                        (
                            "previous_implementations".to_string(),
                            Value::from(context.previous_implementations.len()),
                        ),
                        ("dependent_tasks".to_string(), Value::from(context.dependent_tasks.len())),
                    ]),
                    None,
                    true,
                )
                .await;
        }

        context
    }

    /// Baseline keyword-pair inference: returns reverse adjacency, keyed by
    /// dependency, value is the list of tasks that depend on it.
    #[must_use]
    pub fn analyze_dependencies(tasks: &[Task], infer_implicit: bool) -> HashMap<TaskId, Vec<TaskId>> {
        let mut reverse: HashMap<TaskId, Vec<TaskId>> = HashMap::new();

        for task in tasks {
            for dep in &task.dependencies {
                reverse.entry(dep.clone()).or_default().push(task.id.clone());
            }
        }

        if infer_implicit {
            for a in tasks {
                for b in tasks {
                    if a.id == b.id {
                        continue;
                    }
                    if task_matches_dependent_side(a) && task_matches_dependency_side(b, a) {
                        let entry = reverse.entry(b.id.clone()).or_default();
                        if !entry.contains(&a.id) {
                            entry.push(a.id.clone());
                        }
                    }
                }
            }
        }

        reverse
    }

    /// Topological order over explicit + inferred dependencies; ties broken
    /// by descending priority.
    #[must_use]
    pub fn suggest_task_order(tasks: &[Task]) -> Vec<Task> {
        let reverse = Self::analyze_dependencies(tasks, true);
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        let mut indegree: HashMap<&str, usize> = tasks.iter().map(|t| (t.id.as_str(), 0)).collect();
        for dependents in reverse.values() {
            for dependent in dependents {
                if let Some(count) = indegree.get_mut(dependent.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut ordered = Vec::with_capacity(tasks.len());
        let mut visited: std::collections::HashSet<&str> = std::collections::HashSet::new();

        while !ready.is_empty() {
            ready.sort_by(|a, b| {
                let ta = by_id[a];
                let tb = by_id[b];
                priority_rank(tb.priority).cmp(&priority_rank(ta.priority)).then(ta.id.cmp(&tb.id))
            });
            let next = ready.remove(0);
            if !visited.insert(next) {
                continue;
            }
            ordered.push((*by_id[next]).clone());

            if let Some(dependents) = reverse.get(next) {
                for dependent in dependents {
                    if let Some(count) = indegree.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push(dependent.as_str());
                        }
                    }
                }
            }
        }

        ordered
    }

    #[must_use]
    pub async fn get_decisions_for_task(&self, task_id: &str) -> Vec<Decision> {
        self.decisions
            .read()
            .await
            .iter()
            .filter(|d| d.task_id == task_id)
            .cloned()
            .collect()
    }

    pub async fn clear_old_data(&self, days: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut removed = 0;

        {
            let mut implementations = self.implementations.write().await;
            let before = implementations.len();
            implementations.retain(|_, record| record.stored_at >= cutoff);
            removed += before - implementations.len();
        }

        {
            let mut decisions = self.decisions.write().await;
            let before = decisions.len();
            decisions.retain(|d| d.timestamp >= cutoff);
            removed += before - decisions.len();
        }

        removed
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::Urgent => 3,
        Priority::High => 2,
        Priority::Medium => 1,
        Priority::Low => 0,
    }
}

fn task_text(task: &Task) -> String {
    let mut text = format!("{} {}", task.name, task.description).to_lowercase();
    for label in &task.labels {
        text.push(' ');
        text.push_str(&label.to_lowercase());
    }
    text
}

fn task_matches_dependent_side(task: &Task) -> bool {
    let text = task_text(task);
    DEPENDENCY_KEYWORD_PAIRS
        .iter()
        .any(|(dependent_keywords, _)| dependent_keywords.iter().any(|kw| text.contains(kw)))
}

fn task_matches_dependency_side(candidate: &Task, dependent: &Task) -> bool {
    let dependent_text = task_text(dependent);
    let candidate_text = task_text(candidate);
    DEPENDENCY_KEYWORD_PAIRS.iter().any(|(dependent_keywords, dependency_keywords)| {
        dependent_keywords.iter().any(|kw| dependent_text.contains(kw))
            && dependency_keywords.iter().any(|kw| candidate_text.contains(kw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, name: &str, priority: Priority) -> Task {
        let mut t = Task::new(id, name);
        t.priority = priority;
        t
    }

    #[tokio::test]
    async fn get_context_assembles_previous_implementations() {
        let store = ContextStore::new();
        store
            .add_implementation("dep1", HashMap::from([("api".to_string(), Value::from("v1"))]))
            .await;

        let context = store.get_context("main", &["dep1".to_string()]).await;
        assert_eq!(context.previous_implementations.len(), 1);
        assert!(context.previous_implementations.contains_key("dep1"));
    }

    #[tokio::test]
    async fn architectural_decisions_matched_by_impact_text() {
        let store = ContextStore::new();
        store
            .log_decision("agent1", "other_task", "chose postgres", "perf", "affects task main heavily")
            .await;

        let context = store.get_context("main", &[]).await;
        assert_eq!(context.architectural_decisions.len(), 1);
    }

    #[test]
    fn analyze_dependencies_infers_frontend_backend_pair() {
        let frontend = task("t1", "Build frontend UI", Priority::Medium);
        let backend = task("t2", "Implement backend API", Priority::Medium);

        let reverse = ContextStore::analyze_dependencies(&[frontend, backend], true);
        assert_eq!(reverse.get("t2"), Some(&vec!["t1".to_string()]));
    }

    #[test]
    fn suggest_task_order_respects_explicit_dependencies_and_priority() {
        let mut design = task("design", "Design DB schema", Priority::Medium);
        let mut implement = task("implement", "Implement User API", Priority::Urgent);
        implement.dependencies.push("design".to_string());
        let mut low_priority_independent = task("docs", "Write docs", Priority::Low);
        low_priority_independent.dependencies.clear();
        design.dependencies.clear();

        let ordered = ContextStore::suggest_task_order(&[implement, design, low_priority_independent]);
        let design_pos = ordered.iter().position(|t| t.id == "design").unwrap();
        let implement_pos = ordered.iter().position(|t| t.id == "implement").unwrap();
        assert!(design_pos < implement_pos);
    }
}

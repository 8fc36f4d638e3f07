//! The Coordinator façade: thin orchestration surface exposed to agents,
//! owning the event bus, context store, memory, and the current
//! dependency graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::context::{ContextStore, TaskContext};
use crate::dependency::HybridInferer;
use crate::events::EventBus;
use crate::external::{DependencyRefiner, KanbanProvider};
use crate::memory::{Memory, PredictionV2};
use crate::types::{CoordinatorConfig, DependencyGraph, Event, EventTypes, Task, TaskId, TaskStatus};

/// Bundle returned by `request_next_task`.
#[derive(Debug, Clone)]
pub struct NextTaskBundle {
    pub task: Task,
    pub context: TaskContext,
    pub predictions: PredictionV2,
    pub suggested_order: Vec<TaskId>,
}

pub struct Coordinator {
    pub events: Arc<EventBus>,
    pub context: Arc<ContextStore>,
    pub memory: Arc<Memory>,
    inferer: HybridInferer,
    kanban: Arc<dyn KanbanProvider>,
    refiner: Option<Arc<dyn DependencyRefiner>>,
    roster: RwLock<HashSet<String>>,
    current_graph: RwLock<DependencyGraph>,
}

impl Coordinator {
    #[must_use]
    pub fn new(config: &CoordinatorConfig, kanban: Arc<dyn KanbanProvider>, refiner: Option<Arc<dyn DependencyRefiner>>) -> Self {
        let events = Arc::new(EventBus::new());
        let context = Arc::new(ContextStore::new().with_events(events.clone()));
        let memory = Arc::new(Memory::new().with_events(events.clone()));
        Self {
            events,
            context,
            memory,
            inferer: HybridInferer::new(config.hybrid_inference.clone()),
            kanban,
            refiner,
            roster: RwLock::new(HashSet::new()),
            current_graph: RwLock::new(DependencyGraph::new()),
        }
    }

    pub async fn register_agent(&self, agent_id: &str) {
        self.roster.write().await.insert(agent_id.to_string());
        self.events
            .publish(
                EventTypes::AGENT_REGISTERED,
                "coordinator",
                HashMap::from([("agent_id".to_string(), Value::from(agent_id))]),
                None,
                true,
            )
            .await;
    }

    /// The seven-step task assignment algorithm. Returns `None` when no
    /// task is ready for assignment.
    pub async fn request_next_task(&self, agent_id: &str) -> Option<NextTaskBundle> {
        let tasks = match self.kanban.get_all_tasks().await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "kanban refresh failed, no task can be assigned this round");
                return None;
            }
        };
        self.memory.update_project_tasks(tasks.clone()).await;

        let graph = self.inferer.infer(&tasks, self.refiner.as_deref()).await;
        *self.current_graph.write().await = graph.clone();

        let reverse = graph.reverse_adjacency();
        let done: HashSet<&TaskId> = tasks.iter().filter(|t| t.status == TaskStatus::Done).map(|t| &t.id).collect();

        let mut ready: Vec<&Task> = tasks
            .iter()
            .filter(|t| {
                if t.status != TaskStatus::Todo || t.assigned_to.is_some() {
                    return false;
                }
                let mut deps: HashSet<&TaskId> = t.dependencies.iter().collect();
                if let Some(inferred) = reverse.get(&t.id) {
                    deps.extend(inferred.iter());
                }
                deps.iter().all(|dep| done.contains(dep))
            })
            .collect();

        if ready.is_empty() {
            return None;
        }

        let position = topological_positions(&graph);
        ready.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| position.get(&a.id).copied().unwrap_or(usize::MAX).cmp(&position.get(&b.id).copied().unwrap_or(usize::MAX)))
                .then(a.estimated_hours.partial_cmp(&b.estimated_hours).unwrap_or(std::cmp::Ordering::Equal))
        });

        let chosen = ready[0].clone();
        let context = self.context.get_context(&chosen.id, &chosen.dependencies).await;
        let predictions = self.memory.predict_task_outcome_v2(agent_id, &chosen).await;

        self.memory.record_task_start(agent_id, chosen.clone()).await;
        self.events
            .publish(
                EventTypes::TASK_ASSIGNED,
                "coordinator",
                HashMap::from([
                    ("agent_id".to_string(), Value::from(agent_id)),
                    ("task_id".to_string(), Value::from(chosen.id.clone())),
                ]),
                None,
                true,
            )
            .await;

        let suggested_order: Vec<TaskId> = {
            let mut ordered: Vec<(TaskId, usize)> = position.into_iter().collect();
            ordered.sort_by_key(|(_, pos)| *pos);
            ordered.into_iter().map(|(id, _)| id).collect()
        };

        Some(NextTaskBundle {
            task: chosen,
            context,
            predictions,
            suggested_order,
        })
    }

    pub async fn report_progress(&self, agent_id: &str, task_id: &str, status: TaskStatus, progress: f64, message: &str) -> Event {
        self.events
            .publish(
                EventTypes::TASK_PROGRESS,
                "coordinator",
                HashMap::from([
                    ("agent_id".to_string(), Value::from(agent_id)),
                    ("task_id".to_string(), Value::from(task_id)),
                    ("status".to_string(), serde_json::to_value(status).unwrap_or(Value::Null)),
                    ("progress".to_string(), Value::from(progress)),
                    ("message".to_string(), Value::from(message)),
                ]),
                None,
                true,
            )
            .await
    }

    pub async fn report_blocker(&self, agent_id: &str, task_id: &str, description: &str, severity: &str) -> Event {
        self.events
            .publish(
                EventTypes::TASK_BLOCKED,
                "coordinator",
                HashMap::from([
                    ("agent_id".to_string(), Value::from(agent_id)),
                    ("task_id".to_string(), Value::from(task_id)),
                    ("description".to_string(), Value::from(description)),
                    ("severity".to_string(), Value::from(severity)),
                ]),
                None,
                true,
            )
            .await
    }

    /// Records the outcome (which itself emits `task_completed` or
    /// `task_blocked`); if implementation artifacts accompany completion,
    /// also records them in the context store.
    pub async fn complete_task(
        &self,
        agent_id: &str,
        task_id: &str,
        success: bool,
        actual_hours: f64,
        blockers: Vec<String>,
        implementation: Option<HashMap<String, Value>>,
    ) {
        self.memory
            .record_task_completion(agent_id, task_id, success, actual_hours, blockers)
            .await;

        if let Some(details) = implementation {
            self.context.add_implementation(task_id, details).await;
        }
    }
}

fn topological_positions(graph: &DependencyGraph) -> HashMap<TaskId, usize> {
    let forward = graph.forward_adjacency();
    let mut indegree: HashMap<&TaskId, usize> = graph.nodes.keys().map(|id| (id, 0)).collect();
    for dependents in forward.values() {
        for dependent in dependents {
            if let Some(count) = indegree.get_mut(dependent) {
                *count += 1;
            }
        }
    }

    let mut ready: Vec<TaskId> = indegree.iter().filter(|(_, c)| **c == 0).map(|(id, _)| (*id).clone()).collect();
    ready.sort();
    let mut remaining: HashMap<TaskId, usize> = indegree.into_iter().map(|(id, c)| (id.clone(), c)).collect();
    let mut positions = HashMap::new();
    let mut index = 0;
    let mut queue: std::collections::VecDeque<TaskId> = ready.into();

    while let Some(node) = queue.pop_front() {
        positions.insert(node.clone(), index);
        index += 1;
        if let Some(dependents) = forward.get(&node) {
            let mut next_batch: Vec<TaskId> = Vec::new();
            for dependent in dependents {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next_batch.push(dependent.clone());
                    }
                }
            }
            next_batch.sort();
            queue.extend(next_batch);
        }
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct StaticKanban {
        tasks: Vec<Task>,
    }

    #[async_trait]
    impl KanbanProvider for StaticKanban {
        async fn get_all_tasks(&self) -> Result<Vec<Task>> {
            Ok(self.tasks.clone())
        }
        async fn get_available_tasks(&self) -> Result<Vec<Task>> {
            Ok(self.tasks.iter().filter(|t| t.status == TaskStatus::Todo).cloned().collect())
        }
        async fn assign_task(&self, _task_id: &str, _agent_id: &str) -> Result<()> {
            Ok(())
        }
        async fn update_task_status(&self, _task_id: &str, _status: TaskStatus) -> Result<()> {
            Ok(())
        }
        async fn add_comment(&self, _task_id: &str, _text: &str) -> Result<()> {
            Ok(())
        }
        async fn complete_task(&self, _task_id: &str) -> Result<()> {
            Ok(())
        }
        async fn create_task(&self, task_data: Task) -> Result<Task> {
            Ok(task_data)
        }
    }

    #[tokio::test]
    async fn request_next_task_returns_none_when_nothing_is_ready() {
        let kanban = Arc::new(StaticKanban { tasks: vec![] });
        let coordinator = Coordinator::new(&CoordinatorConfig::default(), kanban, None);
        assert!(coordinator.request_next_task("agent1").await.is_none());
    }

    #[tokio::test]
    async fn request_next_task_assigns_the_only_ready_task() {
        let task = Task::new("t1", "Write docs");
        let kanban = Arc::new(StaticKanban { tasks: vec![task] });
        let coordinator = Coordinator::new(&CoordinatorConfig::default(), kanban, None);
        coordinator.register_agent("agent1").await;

        let bundle = coordinator.request_next_task("agent1").await;
        assert!(bundle.is_some());
        assert_eq!(bundle.unwrap().task.id, "t1");
    }
}

//! Traits for the two external systems the coordinator consumes: the
//! Kanban board and an LLM-backed dependency refiner. Both are consumed
//! through `Arc<dyn Trait>` so the core never depends on a concrete
//! provider crate.

mod kanban_id;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Task, TaskId, TaskStatus};

pub use kanban_id::{build_id_map, encode_description, parse_description, ParsedDescription};

/// Abstract Kanban board. Task identifiers may be remapped: see
/// [`kanban_id`] for the marker-line intake/round-trip format.
#[async_trait]
pub trait KanbanProvider: Send + Sync {
    async fn get_all_tasks(&self) -> Result<Vec<Task>>;

    /// Subset of `get_all_tasks`: unassigned and `status == todo`.
    async fn get_available_tasks(&self) -> Result<Vec<Task>>;

    async fn assign_task(&self, task_id: &str, agent_id: &str) -> Result<()>;

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;

    async fn add_comment(&self, task_id: &str, text: &str) -> Result<()>;

    async fn complete_task(&self, task_id: &str) -> Result<()>;

    async fn create_task(&self, task_data: Task) -> Result<Task>;
}

/// One refiner-proposed edge, parsed from the LLM's JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinedDependency {
    pub task1_id: TaskId,
    pub task2_id: TaskId,
    pub dependency_direction: DependencyDirection,
    pub confidence: f64,
    pub reasoning: String,
    pub dependency_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyDirection {
    #[serde(rename = "1->2")]
    OneToTwo,
    #[serde(rename = "2->1")]
    TwoToOne,
    None,
}

/// A candidate task pair submitted to the refiner for disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousPair {
    pub task1_id: TaskId,
    pub task2_id: TaskId,
}

/// LLM-backed dependency refiner. The core never interprets prose from the
/// model: a malformed or unparseable response is treated as a failure and
/// falls back to pattern-only results for that batch.
#[async_trait]
pub trait DependencyRefiner: Send + Sync {
    async fn refine(&self, tasks: &[Task], pairs: &[AmbiguousPair]) -> Result<Vec<RefinedDependency>>;
}

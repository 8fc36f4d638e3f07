//! Data model and configuration types shared across the coordination
//! engine: tasks, events, decisions, outcomes, profiles, patterns, the
//! dependency graph, and their configuration structs.

pub mod config;
pub mod constants;
pub mod enums;
pub mod structs;

pub use config::{CoordinatorConfig, HybridInferenceConfig, PersistenceBackend, PersistenceConfig};
pub use constants::{EventTypes, EVENT_HISTORY_LIMIT, LEARNING_RATE, MEMORY_DECAY_PER_WEEK};
pub use enums::{DependencyType, DependentTaskKind, InferenceMethod, Priority, TaskClassification, TaskStatus};
pub use structs::{
    AgentProfile, Decision, DependencyGraph, DependentTask, Event, HybridDependency,
    ImplementationRecord, InferredDependency, Task, TaskId, TaskOutcome, TaskPattern,
};

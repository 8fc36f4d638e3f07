//! Event-type string constants and other fixed values shared across
//! modules.

/// Closed enumeration of standard event kinds published on the event bus.
pub struct EventTypes;

impl EventTypes {
    pub const TASK_REQUESTED: &'static str = "task_requested";
    pub const TASK_ASSIGNED: &'static str = "task_assigned";
    pub const TASK_STARTED: &'static str = "task_started";
    pub const TASK_PROGRESS: &'static str = "task_progress";
    pub const TASK_COMPLETED: &'static str = "task_completed";
    pub const TASK_BLOCKED: &'static str = "task_blocked";
    pub const BLOCKER_RESOLVED: &'static str = "blocker_resolved";

    pub const AGENT_REGISTERED: &'static str = "agent_registered";
    pub const AGENT_STATUS_CHANGED: &'static str = "agent_status_changed";
    pub const AGENT_SKILL_UPDATED: &'static str = "agent_skill_updated";

    pub const PROJECT_CREATED: &'static str = "project_created";
    pub const PROJECT_UPDATED: &'static str = "project_updated";
    pub const PROJECT_COMPLETED: &'static str = "project_completed";

    pub const SYSTEM_STARTUP: &'static str = "system_startup";
    pub const SYSTEM_SHUTDOWN: &'static str = "system_shutdown";
    pub const KANBAN_CONNECTED: &'static str = "kanban_connected";
    pub const KANBAN_ERROR: &'static str = "kanban_error";

    pub const CONTEXT_UPDATED: &'static str = "context_updated";
    pub const DEPENDENCY_DETECTED: &'static str = "dependency_detected";
    pub const IMPLEMENTATION_FOUND: &'static str = "implementation_found";

    pub const DECISION_LOGGED: &'static str = "decision_logged";
    pub const PATTERN_DETECTED: &'static str = "pattern_detected";

    pub const PREDICTION_MADE: &'static str = "prediction_made";
    pub const AGENT_LEARNED: &'static str = "agent_learned";

    pub const ERROR: &'static str = "error";
    pub const WARNING: &'static str = "warning";

    /// Subscriber wildcard: receives every published event in addition to
    /// type-specific subscribers.
    pub const WILDCARD: &'static str = "*";

    pub const ALL: &'static [&'static str] = &[
        Self::TASK_REQUESTED,
        Self::TASK_ASSIGNED,
        Self::TASK_STARTED,
        Self::TASK_PROGRESS,
        Self::TASK_COMPLETED,
        Self::TASK_BLOCKED,
        Self::BLOCKER_RESOLVED,
        Self::AGENT_REGISTERED,
        Self::AGENT_STATUS_CHANGED,
        Self::AGENT_SKILL_UPDATED,
        Self::PROJECT_CREATED,
        Self::PROJECT_UPDATED,
        Self::PROJECT_COMPLETED,
        Self::SYSTEM_STARTUP,
        Self::SYSTEM_SHUTDOWN,
        Self::KANBAN_CONNECTED,
        Self::KANBAN_ERROR,
        Self::CONTEXT_UPDATED,
        Self::DEPENDENCY_DETECTED,
        Self::IMPLEMENTATION_FOUND,
        Self::DECISION_LOGGED,
        Self::PATTERN_DETECTED,
        Self::PREDICTION_MADE,
        Self::AGENT_LEARNED,
        Self::ERROR,
        Self::WARNING,
    ];
}

/// Bounded in-memory event history ring size.
pub const EVENT_HISTORY_LIMIT: usize = 1000;

/// Memory tier learning parameters.
pub const LEARNING_RATE: f64 = 0.1;
pub const MEMORY_DECAY_PER_WEEK: f64 = 0.95;

/// Workflow-group threshold above which task pairs inside the group are
/// flagged ambiguous (resolved as groups of 4+).
pub const WORKFLOW_GROUP_AMBIGUITY_THRESHOLD: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_constant_exactly_once() {
        assert_eq!(EventTypes::ALL.len(), 26);
        let unique: std::collections::HashSet<_> = EventTypes::ALL.iter().collect();
        assert_eq!(unique.len(), EventTypes::ALL.len());
    }
}

//! Closed enumerations used across the data model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Hard,
    Soft,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentTaskKind {
    Functional,
    Data,
    Temporal,
}

/// How a dependency edge was derived: matched a deterministic pattern,
/// inferred by an LLM refiner, or both (confidence-weighted combination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMethod {
    Pattern,
    Ai,
    Both,
}

/// Coarse classification used by phase-ordering and ambiguity checks in the
/// dependency inferer. Order matters: classification checks design,
/// testing, and deployment keywords before implementation, since
/// implementation-labeled tasks frequently also contain those words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClassification {
    Design,
    Implementation,
    Testing,
    Deployment,
    Other,
}

impl TaskClassification {
    /// Phase ordering weight per the dependency inferer's phase check;
    /// `Other` sits between implementation and testing.
    #[must_use]
    pub fn phase_order(self) -> f64 {
        match self {
            TaskClassification::Design => 1.0,
            TaskClassification::Implementation => 2.0,
            TaskClassification::Other => 2.5,
            TaskClassification::Testing => 3.0,
            TaskClassification::Deployment => 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_order_is_monotonic_across_the_pipeline() {
        assert!(TaskClassification::Design.phase_order() < TaskClassification::Implementation.phase_order());
        assert!(TaskClassification::Implementation.phase_order() < TaskClassification::Testing.phase_order());
        assert!(TaskClassification::Testing.phase_order() < TaskClassification::Deployment.phase_order());
    }
}

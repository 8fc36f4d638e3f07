//! Task-to-task and task-to-outcome similarity, shared by the prediction
//! pipeline's "similar outcomes" lookups.

use crate::dependency::word_overlap;
use crate::types::{Task, TaskOutcome};

const TECHNICAL_VOCABULARY: &[&str] = &["api", "database", "frontend", "backend", "test", "auth", "ui"];

fn shares_technical_term(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    TECHNICAL_VOCABULARY.iter().any(|term| a.contains(term) && b.contains(term))
}

/// Two tasks are similar if their name word-overlap (Jaccard, stop-words
/// removed) is >= 0.3, or they share a technical term from the fixed
/// vocabulary.
#[must_use]
pub fn tasks_are_similar(a_name: &str, b_name: &str) -> bool {
    word_overlap(a_name, b_name) >= 0.3 || shares_technical_term(a_name, b_name)
}

/// Outcomes sorted by name-word Jaccard similarity to `task`, descending,
/// truncated to `limit`.
#[must_use]
pub fn find_similar_outcomes(task: &Task, outcomes: &[TaskOutcome], limit: usize) -> Vec<TaskOutcome> {
    let mut scored: Vec<(f64, &TaskOutcome)> =
        outcomes.iter().map(|o| (word_overlap(&task.name, &o.task_name), o)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.into_iter().take(limit).map(|(_, o)| o.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_technical_term_counts_as_similar() {
        assert!(tasks_are_similar("Build login form", "Fix auth bug"));
    }

    #[test]
    fn unrelated_names_are_not_similar() {
        assert!(!tasks_are_similar("Paint the fence", "Buy groceries"));
    }
}

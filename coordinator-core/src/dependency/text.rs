//! Small text-matching helpers shared by the pattern engine, the ambiguous
//! pair detector, and memory's similarity rule.

use std::collections::HashSet;

use crate::types::{Task, TaskClassification};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "for", "of", "to", "in", "on", "with", "is", "are", "this",
    "that", "it", "at", "by", "as", "be", "from",
];

#[must_use]
pub fn meaningful_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

#[must_use]
pub fn task_corpus(task: &Task) -> String {
    format!("{} {}", task.name, task.description)
}

/// Jaccard-like overlap used by the "might be related" ambiguity check and
/// by memory's outcome similarity rule: `|intersection| / |union|`.
#[must_use]
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let wa = meaningful_words(a);
    let wb = meaningful_words(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let intersection = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[must_use]
pub fn shared_word_count(a: &str, b: &str) -> usize {
    let wa = meaningful_words(a);
    let wb = meaningful_words(b);
    wa.intersection(&wb).count()
}

/// Coarse phase classification by keyword; checked in design/testing/
/// deployment order before implementation, since "implement" often
/// co-occurs with those words.
#[must_use]
pub fn classify(task: &Task) -> TaskClassification {
    let text = task_corpus(task).to_lowercase();
    let design = ["design", "architect", "plan", "wireframe", "spec"];
    let testing = ["test", "qa", "quality", "verify", "testing"];
    let deployment = ["deploy", "release", "launch", "production"];
    let implementation = ["implement", "build", "create", "code", "develop"];

    if design.iter().any(|kw| text.contains(kw)) {
        TaskClassification::Design
    } else if testing.iter().any(|kw| text.contains(kw)) {
        TaskClassification::Testing
    } else if deployment.iter().any(|kw| text.contains(kw)) {
        TaskClassification::Deployment
    } else if implementation.iter().any(|kw| text.contains(kw)) {
        TaskClassification::Implementation
    } else {
        TaskClassification::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_of_identical_strings_is_one() {
        assert!((word_overlap("implement user api", "implement user api") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_of_unrelated_strings_is_zero() {
        assert_eq!(word_overlap("implement user api", "design database schema"), 0.0);
    }

    #[test]
    fn classify_prefers_testing_over_implementation_keyword_overlap() {
        let mut t = Task::new("t1", "Test the implement feature");
        t.description = String::new();
        assert_eq!(classify(&t), TaskClassification::Testing);
    }
}

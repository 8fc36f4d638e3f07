//! Marker-line encoding embedded in a Kanban task's description, carrying
//! fields the board itself has no column for: the task's original id
//! (before the board's own id assignment), estimated hours, priority, and
//! a dependency list referring to those original ids.
//!
//! The round trip (`encode_description` -> board storage -> `parse_description`)
//! MUST be byte-exact: downstream tooling greps these lines directly.

use std::collections::HashMap;

use regex::Regex;

use crate::types::{Priority, Task, TaskId};

const ORIGINAL_ID_PREFIX: &str = "🏷️ Original ID: ";
const ESTIMATED_PREFIX: &str = "⏱️ Estimated: ";
const DEPENDENCIES_PREFIX: &str = "🔗 Dependencies: ";

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "🔴",
        Priority::High => "🟠",
        Priority::Medium => "🟡",
        Priority::Low => "🟢",
    }
}

fn priority_from_level(level: &str) -> Option<Priority> {
    match level.to_uppercase().as_str() {
        "URGENT" => Some(Priority::Urgent),
        "HIGH" => Some(Priority::High),
        "MEDIUM" => Some(Priority::Medium),
        "LOW" => Some(Priority::Low),
        _ => None,
    }
}

fn priority_level(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "URGENT",
        Priority::High => "HIGH",
        Priority::Medium => "MEDIUM",
        Priority::Low => "LOW",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDescription {
    pub body: String,
    pub original_id: Option<String>,
    pub estimated_hours: Option<f64>,
    pub priority: Option<Priority>,
    pub dependencies: Vec<String>,
}

/// Appends the marker lines for `task` to `body`, using `original_id` as
/// the board-independent identifier.
#[must_use]
pub fn encode_description(body: &str, original_id: &str, task: &Task) -> String {
    let mut out = body.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(ORIGINAL_ID_PREFIX);
    out.push_str(original_id);
    out.push('\n');
    out.push_str(ESTIMATED_PREFIX);
    out.push_str(&format!("{} hours\n", task.estimated_hours));
    out.push_str(&format!(
        "{} Priority: {}\n",
        priority_marker(task.priority),
        priority_level(task.priority)
    ));
    if !task.dependencies.is_empty() {
        out.push_str(DEPENDENCIES_PREFIX);
        out.push_str(&task.dependencies.join(", "));
        out.push('\n');
    }
    out
}

/// Extracts the marker-line fields from a task description, returning the
/// remaining body with those lines stripped.
#[must_use]
pub fn parse_description(description: &str) -> ParsedDescription {
    let original_id_re = Regex::new(r"(?m)^🏷️ Original ID: (.+)$").unwrap();
    let estimated_re = Regex::new(r"(?m)^⏱️ Estimated: ([0-9]+(?:\.[0-9]+)?) hours$").unwrap();
    let priority_re = Regex::new(r"(?m)^[🔴🟠🟡🟢] Priority: (\w+)$").unwrap();
    let dependencies_re = Regex::new(r"(?m)^🔗 Dependencies: (.+)$").unwrap();

    let mut parsed = ParsedDescription::default();

    if let Some(caps) = original_id_re.captures(description) {
        parsed.original_id = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = estimated_re.captures(description) {
        parsed.estimated_hours = caps[1].parse().ok();
    }
    if let Some(caps) = priority_re.captures(description) {
        parsed.priority = priority_from_level(&caps[1]);
    }
    if let Some(caps) = dependencies_re.captures(description) {
        parsed.dependencies = caps[1].split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }

    let mut body_lines = Vec::new();
    for line in description.lines() {
        if original_id_re.is_match(line)
            || estimated_re.is_match(line)
            || priority_re.is_match(line)
            || dependencies_re.is_match(line)
        {
            continue;
        }
        body_lines.push(line);
    }
    parsed.body = body_lines.join("\n");

    parsed
}

/// Builds a map from original id to board id, so dependency lists that
/// reference original ids can be resolved to the ids the core uses
/// internally.
#[must_use]
pub fn build_id_map(tasks: &[(TaskId, ParsedDescription)]) -> HashMap<String, TaskId> {
    tasks
        .iter()
        .filter_map(|(board_id, parsed)| {
            parsed.original_id.clone().map(|original| (original, board_id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_all_fields() {
        let mut task = Task::new("board-1", "Implement API");
        task.estimated_hours = 6.0;
        task.priority = Priority::High;
        task.dependencies = vec!["orig-a".to_string(), "orig-b".to_string()];

        let encoded = encode_description("Implements the thing.", "orig-1", &task);
        let parsed = parse_description(&encoded);

        assert_eq!(parsed.original_id.as_deref(), Some("orig-1"));
        assert_eq!(parsed.estimated_hours, Some(6.0));
        assert_eq!(parsed.priority, Some(Priority::High));
        assert_eq!(parsed.dependencies, vec!["orig-a", "orig-b"]);
        assert_eq!(parsed.body, "Implements the thing.");
    }

    #[test]
    fn build_id_map_resolves_original_ids() {
        let parsed = ParsedDescription {
            original_id: Some("orig-1".to_string()),
            ..Default::default()
        };
        let map = build_id_map(&[("board-1".to_string(), parsed)]);
        assert_eq!(map.get("orig-1"), Some(&"board-1".to_string()));
    }
}

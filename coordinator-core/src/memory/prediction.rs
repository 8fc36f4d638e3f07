//! The prediction pipeline: base predictor, the richer v2 predictor,
//! completion-time / blockage-probability specializations, and cascade
//! delay propagation.

use std::collections::{HashMap, VecDeque};

use chrono::{Timelike, Utc};
use serde::Serialize;

use super::similarity::{find_similar_outcomes, tasks_are_similar};
use crate::types::{AgentProfile, Task, TaskId, TaskOutcome, TaskPattern, MEMORY_DECAY_PER_WEEK};

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub success_probability: f64,
    pub estimated_duration: f64,
    pub blockage_risk: f64,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    pub factor_type: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionV2 {
    pub base: Prediction,
    pub confidence: f64,
    pub complexity_factor: f64,
    pub recency_weight: f64,
    pub adjusted_success: f64,
    pub confidence_interval: (f64, f64),
    pub enhanced_duration: f64,
    pub duration_confidence_interval: (f64, f64),
    pub risk_factors: Vec<RiskFactor>,
    pub mitigation_suggestions: Vec<String>,
}

const COMPLEXITY_UP_LABELS: &[&str] = &["complex", "advanced", "expert", "difficult", "integration"];
const COMPLEXITY_DOWN_LABELS: &[&str] = &["simple", "basic", "trivial", "easy", "minor"];

fn mitigation_for(factor_type: &str) -> String {
    match factor_type {
        "new_agent" => "pair the agent with a reviewer for the first few tasks".to_string(),
        "recurring_blocker" => "address the recurring blocker before assignment".to_string(),
        "low_skill_match" => "pair with an agent experienced in this skill area".to_string(),
        "high_complexity" => "break the task into smaller subtasks".to_string(),
        "unfamiliar_task" => "provide additional context and related examples".to_string(),
        _ => "monitor progress closely".to_string(),
    }
}

/// `predict_task_outcome`: the base predictor.
#[must_use]
pub fn predict_task_outcome(task: &Task, profile: Option<&AgentProfile>, pattern: Option<&TaskPattern>) -> Prediction {
    let mut prediction = Prediction {
        success_probability: 0.5,
        estimated_duration: task.estimated_hours,
        blockage_risk: 0.3,
        risk_factors: Vec::new(),
    };

    if let Some(profile) = profile {
        prediction.success_probability = profile.success_rate();
        if !task.labels.is_empty() {
            let mean = task
                .labels
                .iter()
                .map(|label| profile.skill_success_rates.get(label).copied().unwrap_or(0.5))
                .sum::<f64>()
                / task.labels.len() as f64;
            prediction.success_probability = mean;
        }
        prediction.blockage_risk = profile.blockage_rate();
        if profile.average_estimation_accuracy > 0.0 {
            prediction.estimated_duration = task.estimated_hours / profile.average_estimation_accuracy;
        }
    }

    if let Some(pattern) = pattern {
        prediction.estimated_duration = pattern.median_duration();
        prediction.risk_factors.extend(pattern.common_blockers.keys().cloned());
    }

    prediction
}

fn complexity_factor(task: &Task, agent_outcomes: &[TaskOutcome]) -> f64 {
    let avg_estimated = if agent_outcomes.is_empty() {
        10.0
    } else {
        agent_outcomes.iter().map(|o| o.estimated_hours).sum::<f64>() / agent_outcomes.len() as f64
    };

    let mut factor = if avg_estimated > 0.0 {
        task.estimated_hours / avg_estimated
    } else {
        task.estimated_hours / 10.0
    };

    let labels_lower: Vec<String> = task.labels.iter().map(|l| l.to_lowercase()).collect();
    if COMPLEXITY_UP_LABELS.iter().any(|kw| labels_lower.iter().any(|l| l.contains(kw))) {
        factor *= 1.2;
    }
    if COMPLEXITY_DOWN_LABELS.iter().any(|kw| labels_lower.iter().any(|l| l.contains(kw))) {
        factor *= 0.8;
    }

    factor.clamp(0.5, 3.0)
}

fn confidence_from_sample_size(n: usize) -> f64 {
    let n = n as f64;
    if n < 20.0 {
        0.1 + 0.7 * (n + 1.0).ln() / 21f64.ln()
    } else {
        (0.8 + 0.15 * (n - 20.0) / 20.0).min(0.95)
    }
}

fn recency_weight(agent_outcomes: &[TaskOutcome]) -> f64 {
    if agent_outcomes.is_empty() {
        return 0.5;
    }
    let now = Utc::now();
    let weights: Vec<f64> = agent_outcomes
        .iter()
        .map(|o| {
            let completed = o.completed_at.unwrap_or(now);
            let weeks = (now - completed).num_days() as f64 / 7.0;
            MEMORY_DECAY_PER_WEEK.powf(weeks.max(0.0))
        })
        .collect();
    weights.iter().sum::<f64>() / weights.len() as f64
}

/// `predict_task_outcome_v2`.
#[must_use]
pub fn predict_task_outcome_v2(
    task: &Task,
    profile: Option<&AgentProfile>,
    pattern: Option<&TaskPattern>,
    agent_outcomes: &[TaskOutcome],
    all_outcomes: &[TaskOutcome],
) -> PredictionV2 {
    let base = predict_task_outcome(task, profile, pattern);

    let complexity = complexity_factor(task, agent_outcomes);
    let confidence = confidence_from_sample_size(agent_outcomes.len());
    let recency = recency_weight(agent_outcomes);

    let complexity_discount = if complexity > 1.0 { 1.0 / complexity } else { 1.0 };
    let adjusted_success = (base.success_probability * complexity_discount * recency).clamp(0.1, 0.95);

    let half_width = 0.3 * (1.0 - confidence);
    let confidence_interval = ((adjusted_success - half_width).clamp(0.0, 1.0), (adjusted_success + half_width).clamp(0.0, 1.0));

    let similar: Vec<TaskOutcome> = agent_outcomes
        .iter()
        .filter(|o| tasks_are_similar(&task.name, &o.task_name))
        .cloned()
        .collect();

    let enhanced_duration = if !similar.is_empty() {
        let mean_actual: f64 = similar.iter().map(|o| o.actual_hours).sum::<f64>() / similar.len() as f64;
        let mean_estimated: f64 = similar.iter().map(|o| o.estimated_hours).sum::<f64>() / similar.len() as f64;
        let adj = if mean_estimated > 0.0 { mean_actual / mean_estimated } else { 1.0 };
        (task.estimated_hours * adj).max(0.5)
    } else if let Some(profile) = profile {
        if profile.average_estimation_accuracy > 0.0 {
            (task.estimated_hours / profile.average_estimation_accuracy).max(0.5)
        } else {
            (task.estimated_hours * complexity).max(0.5)
        }
    } else {
        (task.estimated_hours * complexity).max(0.5)
    };

    let duration_confidence_interval = (enhanced_duration * 0.8, enhanced_duration * 1.3);

    let mut risk_factors = Vec::new();
    if profile.is_none() {
        risk_factors.push(RiskFactor {
            factor_type: "new_agent".to_string(),
            severity: Severity::Medium,
            description: "no prior performance history for this agent".to_string(),
        });
    }
    if let Some(profile) = profile {
        for (blocker, count) in &profile.common_blockers {
            let freq = *count as f64 / profile.total_tasks.max(1) as f64;
            if *count > 2 && freq > 0.1 {
                risk_factors.push(RiskFactor {
                    factor_type: "recurring_blocker".to_string(),
                    severity: Severity::Medium,
                    description: format!("'{blocker}' has blocked this agent before"),
                });
            }
        }
        for label in &task.labels {
            if let Some(rate) = profile.skill_success_rates.get(label) {
                if *rate < 0.5 {
                    risk_factors.push(RiskFactor {
                        factor_type: "low_skill_match".to_string(),
                        severity: Severity::High,
                        description: format!("agent success rate for '{label}' is below 50%"),
                    });
                }
            }
        }
    }
    if complexity > 2.0 {
        risk_factors.push(RiskFactor {
            factor_type: "high_complexity".to_string(),
            severity: Severity::High,
            description: "task complexity is well above this agent's typical workload".to_string(),
        });
    }
    if !all_outcomes.iter().any(|o| tasks_are_similar(&task.name, &o.task_name)) {
        risk_factors.push(RiskFactor {
            factor_type: "unfamiliar_task".to_string(),
            severity: Severity::Low,
            description: "no similar tasks found in history".to_string(),
        });
    }

    let mitigation_suggestions = risk_factors.iter().map(|f| mitigation_for(&f.factor_type)).collect();

    PredictionV2 {
        base,
        confidence,
        complexity_factor: complexity,
        recency_weight: recency,
        adjusted_success,
        confidence_interval,
        enhanced_duration,
        duration_confidence_interval,
        risk_factors,
        mitigation_suggestions,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionTimePrediction {
    pub expected_hours: f64,
    pub confidence_interval: (f64, f64),
    pub factors: Vec<String>,
    pub confidence: f64,
    pub sample_size: usize,
}

/// `predict_completion_time`.
#[must_use]
pub fn predict_completion_time(task: &Task, agent_outcomes: &[TaskOutcome], all_outcomes: &[TaskOutcome]) -> CompletionTimePrediction {
    let agent_similar: Vec<&TaskOutcome> = agent_outcomes.iter().filter(|o| tasks_are_similar(&task.name, &o.task_name)).collect();
    let cross_agent_similar: Vec<&TaskOutcome> = all_outcomes.iter().filter(|o| tasks_are_similar(&task.name, &o.task_name)).collect();

    let mut factors = Vec::new();
    let (expected_hours, confidence, variance, sample_size) = if agent_similar.len() >= 5 {
        factors.push("high confidence: agent has handled similar tasks before".to_string());
        let mean = agent_similar.iter().map(|o| o.actual_hours).sum::<f64>() / agent_similar.len() as f64;
        (mean, 0.8, 0.3, agent_similar.len())
    } else if cross_agent_similar.len() >= 3 {
        factors.push("medium confidence: similar tasks found across agents".to_string());
        let mean = cross_agent_similar.iter().map(|o| o.actual_hours).sum::<f64>() / cross_agent_similar.len() as f64;
        (mean, 0.6, 0.25, cross_agent_similar.len())
    } else {
        factors.push("default confidence: insufficient historical data".to_string());
        (task.estimated_hours, 0.5, 0.3, 0)
    };

    let mut upper = expected_hours * (1.0 + variance);
    let lower = expected_hours * (1.0 - variance);

    if Utc::now().hour() >= 15 {
        factors.push("late in the day: added buffer to the upper bound".to_string());
        upper *= 1.1;
    }

    CompletionTimePrediction {
        expected_hours,
        confidence_interval: (lower, upper),
        factors,
        confidence,
        sample_size,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockageProbability {
    pub overall_risk: f64,
    pub risk_breakdown: HashMap<String, f64>,
    pub preventive_measures: Vec<String>,
    pub historical_blockers: Vec<String>,
}

const LABEL_RISKS: &[(&str, f64)] = &[
    ("integration", 0.4),
    ("deployment", 0.35),
    ("migration", 0.5),
    ("authentication", 0.45),
    ("third-party", 0.55),
];

fn preventive_measure_for(risk_key: &str) -> String {
    if risk_key.starts_with("authentication") {
        "verify credentials and token expiry ahead of time".to_string()
    } else if risk_key.starts_with("integration") || risk_key.starts_with("third-party") {
        "confirm API contracts with the external party before starting".to_string()
    } else if risk_key.starts_with("deployment") {
        "rehearse the rollback plan before releasing".to_string()
    } else if risk_key.starts_with("migration") {
        "run the migration against a staging snapshot first".to_string()
    } else if risk_key == "multiple_dependencies" {
        "confirm all upstream dependencies are complete before assignment".to_string()
    } else {
        "monitor closely and checkpoint progress frequently".to_string()
    }
}

/// `predict_blockage_probability`.
#[must_use]
pub fn predict_blockage_probability(task: &Task, profile: Option<&AgentProfile>, all_outcomes: &[TaskOutcome]) -> BlockageProbability {
    let mut breakdown: HashMap<String, f64> = HashMap::new();

    let labels_lower: Vec<String> = task.labels.iter().map(|l| l.to_lowercase()).collect();
    for (keyword, risk) in LABEL_RISKS {
        if labels_lower.iter().any(|l| l.contains(keyword)) {
            breakdown.insert(format!("{keyword}_complexity"), *risk);
        }
    }

    if task.dependencies.len() > 3 {
        let risk = 0.3 + 0.05 * task.dependencies.len() as f64;
        breakdown.insert("multiple_dependencies".to_string(), risk);
    }

    if let Some(profile) = profile {
        for (blocker, count) in &profile.common_blockers {
            let freq = *count as f64 / profile.total_tasks.max(1) as f64;
            if freq > 0.1 {
                breakdown.insert(blocker.clone(), freq);
            }
        }
    }

    let overall_risk = if breakdown.is_empty() {
        profile.map_or(0.3, AgentProfile::blockage_rate)
    } else {
        (1.0 - breakdown.values().fold(1.0, |acc, r| acc * (1.0 - r))).min(0.95)
    };

    let similar = find_similar_outcomes(task, all_outcomes, 20);
    let mut blocker_counts: HashMap<String, usize> = HashMap::new();
    for outcome in &similar {
        for blocker in &outcome.blockers {
            *blocker_counts.entry(blocker.clone()).or_default() += 1;
        }
    }
    let mut historical_blockers: Vec<(String, usize)> = blocker_counts.into_iter().collect();
    historical_blockers.sort_by(|a, b| b.1.cmp(&a.1));
    let historical_blockers: Vec<String> = historical_blockers.into_iter().take(5).map(|(b, _)| b).collect();

    let preventive_measures = breakdown.keys().map(|k| preventive_measure_for(k)).collect();

    BlockageProbability {
        overall_risk,
        risk_breakdown: breakdown,
        preventive_measures,
        historical_blockers,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeEffects {
    pub affected_tasks: Vec<(TaskId, f64)>,
    pub total_delay: f64,
    pub critical_path_impact: bool,
    pub mitigation_options: Vec<String>,
}

/// `predict_cascade_effects`: BFS over the explicit dependency graph
/// starting from `task_id`, propagating `delay * 0.8` per hop.
#[must_use]
pub fn predict_cascade_effects(task_id: &str, delay_hours: f64, all_tasks: &[Task]) -> CascadeEffects {
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in all_tasks {
        for dep in &task.dependencies {
            dependents_of.entry(dep.as_str()).or_default().push(task.id.as_str());
        }
    }

    let mut affected: Vec<(TaskId, f64)> = Vec::new();
    let mut queue: VecDeque<(&str, f64)> = VecDeque::new();
    queue.push_back((task_id, delay_hours));
    let mut visited = std::collections::HashSet::new();
    visited.insert(task_id.to_string());

    while let Some((current, delay)) = queue.pop_front() {
        if let Some(dependents) = dependents_of.get(current) {
            for dependent in dependents {
                if !visited.insert((*dependent).to_string()) {
                    continue;
                }
                let propagated = delay * 0.8;
                affected.push(((*dependent).to_string(), propagated));
                queue.push_back((dependent, propagated));
            }
        }
    }

    let total_delay = delay_hours + affected.iter().map(|(_, d)| d).sum::<f64>();
    let critical_path_impact = affected.len() > 3 || total_delay > 24.0;

    let mut mitigation_options = Vec::new();
    if critical_path_impact {
        mitigation_options.push("reassign downstream tasks to parallel-capable agents".to_string());
        mitigation_options.push("renegotiate the delayed task's scope to cut the critical path".to_string());
    }

    CascadeEffects {
        affected_tasks: affected,
        total_delay,
        critical_path_impact,
        mitigation_options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;

    fn outcome(name: &str, estimated: f64, actual: f64) -> TaskOutcome {
        TaskOutcome {
            task_id: "past".to_string(),
            agent_id: "a".to_string(),
            task_name: name.to_string(),
            estimated_hours: estimated,
            actual_hours: actual,
            success: true,
            blockers: Vec::new(),
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn prediction_with_history_matches_the_estimation_scale_up() {
        let mut task = Task::new("t", "Build the report exporter");
        task.estimated_hours = 10.0;

        let history: Vec<TaskOutcome> = (0..10).map(|_| outcome("Build the report exporter", 5.0, 6.0)).collect();
        let profile = AgentProfile::new("a");

        let prediction = predict_task_outcome_v2(&task, Some(&profile), None, &history, &history);

        assert!((prediction.enhanced_duration - 12.0).abs() < 0.01);
        assert!(prediction.confidence >= 0.5);
        assert!((1.8..=2.2).contains(&prediction.complexity_factor));
        assert!(!prediction.risk_factors.iter().any(|f| f.factor_type == "new_agent"));
    }

    #[test]
    fn blockage_risk_combines_breakdown_multiplicatively() {
        let mut task = Task::new("t", "Wire up the auth integration");
        task.labels = ["authentication", "integration"].into_iter().map(String::from).collect();
        task.dependencies = vec!["d1", "d2", "d3", "d4", "d5"].into_iter().map(String::from).collect();

        let mut profile = AgentProfile::new("a");
        profile.total_tasks = 10;
        profile.blocked_tasks = 2;
        profile.common_blockers.insert("API unavailable".to_string(), 3);

        let prediction = predict_blockage_probability(&task, Some(&profile), &[]);

        assert!((prediction.risk_breakdown["authentication_complexity"] - 0.45).abs() < 1e-9);
        assert!((prediction.risk_breakdown["integration_complexity"] - 0.4).abs() < 1e-9);
        assert!((prediction.risk_breakdown["multiple_dependencies"] - 0.55).abs() < 1e-9);
        assert!((prediction.risk_breakdown["API unavailable"] - 0.3).abs() < 1e-9);
        assert!((prediction.overall_risk - 0.896).abs() < 0.001);
    }

    #[test]
    fn cascade_delay_decays_by_hop_along_the_chain() {
        let mut b = Task::new("b", "B");
        b.dependencies.push("a".to_string());
        let mut c = Task::new("c", "C");
        c.dependencies.push("b".to_string());
        let mut d = Task::new("d", "D");
        d.dependencies.push("c".to_string());
        let tasks = vec![Task::new("a", "A"), b, c, d];

        let effects = predict_cascade_effects("a", 10.0, &tasks);

        assert_eq!(effects.affected_tasks.len(), 3);
        assert!((effects.total_delay - 29.52).abs() < 0.01);
        assert!(effects.critical_path_impact);
    }
}

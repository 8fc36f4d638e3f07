//! Four-tier memory: working, episodic, semantic, procedural, plus the
//! prediction pipeline built on top of them.

mod prediction;
mod similarity;
mod tiers;

pub use prediction::{
    predict_cascade_effects as predict_cascade_effects_pure, predict_task_outcome_v2 as predict_task_outcome_v2_pure,
    BlockageProbability, CascadeEffects, CompletionTimePrediction, Prediction, PredictionV2, RiskFactor, Severity,
};
pub use similarity::find_similar_outcomes as find_similar_outcomes_pure;
pub use tiers::{pattern_key, ActiveTask, Episodic, Procedural, Semantic, Working};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::events::EventBus;
use crate::persistence::{collections, PersistenceBackend};
use crate::resilience::with_fallback;
use crate::types::{AgentProfile, Event, EventTypes, LEARNING_RATE, Task, TaskOutcome, TaskPattern};

pub struct Memory {
    working: RwLock<Working>,
    episodic: RwLock<Episodic>,
    semantic: RwLock<Semantic>,
    procedural: RwLock<Procedural>,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    events: Option<Arc<EventBus>>,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            working: RwLock::new(Working::default()),
            episodic: RwLock::new(Episodic::default()),
            semantic: RwLock::new(Semantic::default()),
            procedural: RwLock::new(Procedural::default()),
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

    pub async fn update_project_tasks(&self, tasks: Vec<Task>) {
        self.working.write().await.all_tasks = tasks;
    }

    pub async fn record_task_start(&self, agent_id: &str, task: Task) {
        {
            let mut working = self.working.write().await;
            working.active_tasks.insert(
                agent_id.to_string(),
                ActiveTask {
                    task: task.clone(),
                    started_at: Utc::now(),
                    events: Vec::new(),
                },
            );
        }

        if let Some(events) = &self.events {
            events
                .publish(
                    EventTypes::TASK_STARTED,
                    "memory",
                    HashMap::from([
                        ("agent_id".to_string(), serde_json::Value::from(agent_id)),
                        ("task_id".to_string(), serde_json::Value::from(task.id)),
                    ]),
                    None,
                    true,
                )
                .await;
        }
    }

    /// Returns `None` if no active task matches `task_id` for `agent_id` —
    /// the state-machine no-op case.
    pub async fn record_task_completion(
        &self,
        agent_id: &str,
        task_id: &str,
        success: bool,
        actual_hours: f64,
        blockers: Vec<String>,
    ) -> Option<TaskOutcome> {
        let active = {
            let mut working = self.working.write().await;
            match working.active_tasks.get(agent_id) {
                Some(entry) if entry.task.id == task_id => working.active_tasks.remove(agent_id),
                _ => None,
            }
        }?;

        let outcome = TaskOutcome {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            task_name: active.task.name.clone(),
            estimated_hours: active.task.estimated_hours,
            actual_hours,
            success,
            blockers,
            started_at: Some(active.started_at),
            completed_at: Some(Utc::now()),
        };

        self.episodic.write().await.push(outcome.clone());
        self.update_agent_profile(agent_id, &outcome, &active.task).await;
        self.learn_task_patterns(&outcome, &active.task).await;

        if let Some(backend) = &self.persistence {
            let backend = backend.clone();
            let key = format!(
                "{}_{}_{}",
                outcome.task_id,
                outcome.agent_id,
                outcome.completed_at.map(|t| t.timestamp()).unwrap_or_default()
            );
            let value = serde_json::to_value(&outcome).unwrap_or(serde_json::Value::Null);
            with_fallback(
                || async {
                    backend
                        .store(collections::TASK_OUTCOMES, &key, value)
                        .await
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                },
                || async {
                    warn!("failed to persist task outcome, continuing in-memory only");
                },
            )
            .await;
        }

        if let Some(events) = &self.events {
            let event_type = if success { EventTypes::TASK_COMPLETED } else { EventTypes::TASK_BLOCKED };
            events
                .publish(
                    event_type,
                    "memory",
                    HashMap::from([
                        ("agent_id".to_string(), serde_json::Value::from(agent_id)),
                        ("task_id".to_string(), serde_json::Value::from(task_id)),
                        ("success".to_string(), serde_json::Value::from(success)),
                    ]),
                    None,
                    true,
                )
                .await;
        }

        Some(outcome)
    }

    async fn update_agent_profile(&self, agent_id: &str, outcome: &TaskOutcome, task: &Task) {
        let mut semantic = self.semantic.write().await;
        let profile = semantic
            .agent_profiles
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentProfile::new(agent_id));

        profile.total_tasks += 1;
        if outcome.success {
            profile.successful_tasks += 1;
        } else {
            profile.failed_tasks += 1;
        }
        if !outcome.blockers.is_empty() {
            profile.blocked_tasks += 1;
        }

        let success_value = if outcome.success { 1.0 } else { 0.0 };
        for label in &task.labels {
            let rate = profile.skill_success_rates.entry(label.clone()).or_insert(0.5);
            *rate = *rate * (1.0 - LEARNING_RATE) + success_value * LEARNING_RATE;
        }

        profile.average_estimation_accuracy =
            profile.average_estimation_accuracy * (1.0 - LEARNING_RATE) + outcome.estimation_accuracy() * LEARNING_RATE;

        for blocker in &outcome.blockers {
            *profile.common_blockers.entry(blocker.clone()).or_insert(0) += 1;
        }

        if let Some(backend) = &self.persistence {
            let backend = backend.clone();
            let agent_id = agent_id.to_string();
            let value = serde_json::to_value(&*profile).unwrap_or(serde_json::Value::Null);
            drop(semantic);
            with_fallback(
                || async {
                    backend
                        .store(collections::AGENT_PROFILES, &agent_id, value)
                        .await
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                },
                || async {
                    warn!("failed to persist agent profile, continuing in-memory only");
                },
            )
            .await;
        }
    }

    async fn learn_task_patterns(&self, outcome: &TaskOutcome, task: &Task) {
        let key = pattern_key(task);
        let mut semantic = self.semantic.write().await;
        let pattern = semantic
            .task_patterns
            .entry(key.clone())
            .or_insert_with(|| TaskPattern::new(key, task.labels.iter().cloned().collect()));

        pattern.push_duration(outcome.actual_hours);
        let success_value = if outcome.success { 1.0 } else { 0.0 };
        pattern.success_rate = pattern.success_rate * 0.9 + success_value * 0.1;
        if outcome.success {
            pattern.best_agents.push(outcome.agent_id.clone());
        }
        for blocker in &outcome.blockers {
            *pattern.common_blockers.entry(blocker.clone()).or_insert(0) += 1;
        }
    }

    pub async fn predict_task_outcome(&self, agent_id: &str, task: &Task) -> Prediction {
        let semantic = self.semantic.read().await;
        let profile = semantic.agent_profiles.get(agent_id);
        let pattern = semantic.task_patterns.get(&pattern_key(task));
        prediction::predict_task_outcome(task, profile, pattern)
    }

    pub async fn predict_task_outcome_v2(&self, agent_id: &str, task: &Task) -> PredictionV2 {
        let semantic = self.semantic.read().await;
        let profile = semantic.agent_profiles.get(agent_id);
        let pattern = semantic.task_patterns.get(&pattern_key(task));
        let episodic = self.episodic.read().await;
        let agent_outcomes: Vec<TaskOutcome> = episodic.outcomes.iter().filter(|o| o.agent_id == agent_id).cloned().collect();
        prediction::predict_task_outcome_v2(task, profile, pattern, &agent_outcomes, &episodic.outcomes)
    }

    pub async fn predict_completion_time(&self, agent_id: &str, task: &Task) -> CompletionTimePrediction {
        let episodic = self.episodic.read().await;
        let agent_outcomes: Vec<TaskOutcome> = episodic.outcomes.iter().filter(|o| o.agent_id == agent_id).cloned().collect();
        prediction::predict_completion_time(task, &agent_outcomes, &episodic.outcomes)
    }

    pub async fn predict_blockage_probability(&self, agent_id: &str, task: &Task) -> BlockageProbability {
        let semantic = self.semantic.read().await;
        let profile = semantic.agent_profiles.get(agent_id);
        let episodic = self.episodic.read().await;
        prediction::predict_blockage_probability(task, profile, &episodic.outcomes)
    }

    pub async fn predict_cascade_effects(&self, task_id: &str, delay_hours: f64) -> CascadeEffects {
        let working = self.working.read().await;
        prediction::predict_cascade_effects(task_id, delay_hours, &working.all_tasks)
    }

    /// Prefers the backend's SQL median; falls back to an in-memory
    /// median over successful outcomes with `actual_hours > 0`; defaults
    /// to 1.0 with no history.
    pub async fn get_global_median_duration(&self) -> f64 {
        if let Some(backend) = &self.persistence {
            if let Ok(Some(median)) = backend.calculate_median_task_duration().await {
                return median;
            }
        }

        let episodic = self.episodic.read().await;
        let mut durations: Vec<f64> = episodic
            .outcomes
            .iter()
            .filter(|o| o.success && o.actual_hours > 0.0)
            .map(|o| o.actual_hours)
            .collect();
        if durations.is_empty() {
            return 1.0;
        }
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = durations.len() / 2;
        if durations.len() % 2 == 0 {
            (durations[mid - 1] + durations[mid]) / 2.0
        } else {
            durations[mid]
        }
    }

    pub async fn get_median_duration_by_type(&self, pattern_type: &str) -> Option<f64> {
        let semantic = self.semantic.read().await;
        semantic.task_patterns.get(pattern_type).map(TaskPattern::median_duration)
    }

    pub async fn find_similar_outcomes(&self, task: &Task, limit: usize) -> Vec<TaskOutcome> {
        let episodic = self.episodic.read().await;
        similarity::find_similar_outcomes(task, &episodic.outcomes, limit)
    }

    /// Supplemental operation: an agent's estimation accuracy and success
    /// rate over time, bucketed by completion date.
    pub async fn agent_performance_trajectory(&self, agent_id: &str) -> Vec<(chrono::NaiveDate, f64, f64)> {
        let episodic = self.episodic.read().await;
        let mut by_date: HashMap<chrono::NaiveDate, Vec<&TaskOutcome>> = HashMap::new();
        for (date, outcomes) in &episodic.timeline {
            for outcome in outcomes {
                if outcome.agent_id == agent_id {
                    by_date.entry(*date).or_default().push(outcome);
                }
            }
        }

        let mut trajectory: Vec<(chrono::NaiveDate, f64, f64)> = by_date
            .into_iter()
            .map(|(date, outcomes)| {
                let success_rate = outcomes.iter().filter(|o| o.success).count() as f64 / outcomes.len() as f64;
                let accuracy = outcomes.iter().map(TaskOutcome::estimation_accuracy).sum::<f64>() / outcomes.len() as f64;
                (date, success_rate, accuracy)
            })
            .collect();
        trajectory.sort_by_key(|(date, _, _)| *date);
        trajectory
    }

    pub async fn record_event(&self, event: Event) {
        let mut working = self.working.write().await;
        working.recent_events.push(event.clone());
        if let Some(entry) = working.active_tasks.values_mut().find(|a| {
            event
                .data
                .get("task_id")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|id| id == a.task.id)
        }) {
            entry.events.push(event);
        }
    }

    #[must_use]
    pub fn procedural(&self) -> &RwLock<Procedural> {
        &self.procedural
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, name: &str) -> Task {
        Task::new(id, name)
    }

    #[tokio::test]
    async fn record_task_completion_clears_active_entry_and_appends_outcome() {
        let memory = Memory::new();
        let t = task("t1", "Implement feature");
        memory.record_task_start("agent1", t.clone()).await;

        let outcome = memory.record_task_completion("agent1", "t1", true, 5.0, vec![]).await;
        assert!(outcome.is_some());

        let working = memory.working.read().await;
        assert!(!working.active_tasks.contains_key("agent1"));

        let episodic = memory.episodic.read().await;
        assert_eq!(episodic.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn completion_with_mismatched_task_id_is_a_no_op() {
        let memory = Memory::new();
        memory.record_task_start("agent1", task("t1", "A")).await;
        let outcome = memory.record_task_completion("agent1", "different", true, 1.0, vec![]).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn agent_profile_tracks_totals_consistently() {
        let memory = Memory::new();
        memory.record_task_start("agent1", task("t1", "A")).await;
        memory.record_task_completion("agent1", "t1", true, 2.0, vec![]).await;
        memory.record_task_start("agent1", task("t2", "B")).await;
        memory
            .record_task_completion("agent1", "t2", false, 2.0, vec!["blocked".to_string()])
            .await;

        let semantic = memory.semantic.read().await;
        let profile = semantic.agent_profiles.get("agent1").unwrap();
        assert_eq!(profile.total_tasks, profile.successful_tasks + profile.failed_tasks);
        assert!(profile.blocked_tasks <= profile.total_tasks);
    }
}

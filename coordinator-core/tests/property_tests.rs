//! Property-based tests over arbitrary inputs for the invariants that a
//! handful of fixed examples can't really cover: the sliding-window bound on
//! `TaskPattern::recent_durations`, and the clamped ranges on the prediction
//! pipeline's complexity factor and confidence interval.

use coordinator_core::memory::predict_task_outcome_v2_pure;
use coordinator_core::types::{AgentProfile, Task, TaskOutcome, TaskPattern};
use proptest::prelude::*;

fn outcome(hours: f64) -> TaskOutcome {
    TaskOutcome {
        task_id: "past".to_string(),
        agent_id: "a".to_string(),
        task_name: "past task".to_string(),
        estimated_hours: hours,
        actual_hours: hours,
        success: true,
        blockers: Vec::new(),
        started_at: None,
        completed_at: None,
    }
}

proptest! {
    #[test]
    fn recent_durations_never_exceeds_the_sliding_window(
        durations in proptest::collection::vec(0.0f64..500.0, 0..300)
    ) {
        let mut pattern = TaskPattern::new("impl", vec!["api".to_string()]);
        for d in &durations {
            pattern.push_duration(*d);
        }
        prop_assert!(pattern.recent_durations.len() <= TaskPattern::MAX_SAMPLES);
        if let Some(last) = durations.last() {
            prop_assert_eq!(pattern.recent_durations.last().copied(), Some(*last));
        }
    }

    #[test]
    fn complexity_factor_is_always_clamped(
        task_hours in 0.1f64..500.0,
        agent_hours in proptest::collection::vec(0.1f64..500.0, 0..20),
    ) {
        let mut task = Task::new("t", "Build the report exporter");
        task.estimated_hours = task_hours;
        let agent_outcomes: Vec<TaskOutcome> = agent_hours.iter().map(|h| outcome(*h)).collect();

        let prediction = predict_task_outcome_v2_pure(&task, None, None, &agent_outcomes, &[]);
        prop_assert!(prediction.complexity_factor >= 0.5 && prediction.complexity_factor <= 3.0);
    }

    #[test]
    fn confidence_interval_and_adjusted_success_stay_within_range(
        task_hours in 0.1f64..500.0,
        agent_hours in proptest::collection::vec(0.1f64..500.0, 0..30),
        total_tasks in 0u64..100,
        successful_tasks in 0u64..100,
    ) {
        let mut task = Task::new("t", "Build the report exporter");
        task.estimated_hours = task_hours;
        let agent_outcomes: Vec<TaskOutcome> = agent_hours.iter().map(|h| outcome(*h)).collect();

        let mut profile = AgentProfile::new("a");
        profile.total_tasks = total_tasks;
        profile.successful_tasks = successful_tasks.min(total_tasks);
        profile.failed_tasks = profile.total_tasks - profile.successful_tasks;

        let prediction = predict_task_outcome_v2_pure(&task, Some(&profile), None, &agent_outcomes, &[]);
        let (lower, upper) = prediction.confidence_interval;

        prop_assert!((0.0..=1.0).contains(&lower));
        prop_assert!((0.0..=1.0).contains(&upper));
        prop_assert!(lower <= upper);
        prop_assert!((0.1..=0.95).contains(&prediction.adjusted_success));
    }
}

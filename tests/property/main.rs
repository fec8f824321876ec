// tests/property/main.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use wavedag::dag::{StructuralError, TaskGraph, TaskSpec, validate};
use wavedag::engine::{SchedulerCore, TaskOutcome, WaveStep};
use wavedag::exec::TaskResult;
use wavedag::types::TaskState;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<TaskSpec>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut spec = TaskSpec::new(format!("task_{i}"), format!("role_{}", i % 3));
                    let mut seen = HashSet::new();
                    if i > 0 {
                        for d in potential {
                            if seen.insert(d % i) {
                                spec = spec.after(format!("task_{}", d % i));
                            }
                        }
                    }
                    spec
                })
                .collect()
        })
    })
}

/// Drive the core to completion; returns the waves actually dispatched.
fn drive(core: &mut SchedulerCore, failing: &HashSet<String>) -> Vec<Vec<String>> {
    let mut waves = Vec::new();
    loop {
        match core.next_step() {
            WaveStep::Dispatch { tasks, .. } => {
                let now = Utc::now();
                waves.push(tasks.iter().map(|t| t.id.clone()).collect());
                let results = tasks
                    .into_iter()
                    .map(|t| TaskResult {
                        outcome: if failing.contains(&t.id) {
                            TaskOutcome::Failure("scripted".into())
                        } else {
                            TaskOutcome::Success(serde_json::Value::Null)
                        },
                        id: t.id,
                        started_at: now,
                        finished_at: now,
                        elapsed: Duration::ZERO,
                    })
                    .collect();
                core.apply_outcomes(results);
            }
            WaveStep::Stalled { .. } => {
                core.block_remaining(Utc::now());
            }
            WaveStep::Finished => return waves,
        }
    }
}

proptest! {
    #[test]
    fn acyclic_graphs_validate_cleanly(specs in dag_strategy(12)) {
        prop_assert!(validate(&specs).is_empty());
    }

    #[test]
    fn closing_a_chain_is_reported_as_a_cycle(len in 1usize..8) {
        let specs: Vec<TaskSpec> = (0..len)
            .map(|i| TaskSpec::new(format!("t{i}"), "r").after(format!("t{}", (i + 1) % len)))
            .collect();

        let errors = validate(&specs);
        prop_assert_eq!(errors.len(), 1);
        match &errors[0] {
            StructuralError::Cycle { path } => prop_assert_eq!(path.len(), len),
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn scheduling_invariants_hold(
        specs in dag_strategy(12),
        limit in 1usize..5,
        failing_idx in proptest::collection::hash_set(0usize..12, 0..4),
    ) {
        let failing: HashSet<String> = failing_idx.iter().map(|i| format!("task_{i}")).collect();
        let deps: HashMap<String, Vec<String>> = specs
            .iter()
            .map(|s| (s.id.clone(), s.dependencies.clone()))
            .collect();
        let order: Vec<String> = specs.iter().map(|s| s.id.clone()).collect();

        let graph = TaskGraph::build(specs).unwrap();
        let mut core = SchedulerCore::new(graph, limit);
        let waves = drive(&mut core, &failing);

        // Concurrency bound, and every dependency finished in an earlier wave.
        let mut done: HashSet<String> = HashSet::new();
        for wave in &waves {
            prop_assert!(wave.len() <= limit);
            prop_assert!(!wave.is_empty());
            for id in wave {
                for dep in &deps[id] {
                    prop_assert!(done.contains(dep), "{} ran before {}", id, dep);
                    prop_assert!(!failing.contains(dep));
                }
            }
            done.extend(wave.iter().cloned());
        }

        // Expected final states, computed in declaration (= topological) order.
        let mut expected: HashMap<&str, TaskState> = HashMap::new();
        for id in &order {
            let dep_ok = deps[id]
                .iter()
                .all(|d| expected.get(d.as_str()) == Some(&TaskState::Completed));
            let state = if !dep_ok {
                TaskState::Blocked
            } else if failing.contains(id) {
                TaskState::Failed
            } else {
                TaskState::Completed
            };
            expected.insert(id.as_str(), state);
        }

        prop_assert!(core.is_finished());
        for id in &order {
            let state = core.state_of(id).unwrap();
            prop_assert!(state.is_terminal());
            prop_assert_eq!(state, expected[id.as_str()], "task {}", id);
        }
    }

    #[test]
    fn wave_groupings_are_deterministic(specs in dag_strategy(10), limit in 1usize..4) {
        let failing = HashSet::new();
        let mut first = SchedulerCore::new(TaskGraph::build(specs.clone()).unwrap(), limit);
        let mut second = SchedulerCore::new(TaskGraph::build(specs).unwrap(), limit);
        prop_assert_eq!(drive(&mut first, &failing), drive(&mut second, &failing));
    }
}

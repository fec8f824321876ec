// tests/integration/command_roles.rs

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wavedag::dag::TaskGraph;
use wavedag::engine::Scheduler;
use wavedag::exec::{RoleRouter, SimulatedRunner, TaskRunner};
use wavedag::types::TaskState;
use wavedag_test_utils::{PlanBuilder, TaskBuilder, init_tracing, with_timeout};

#[tokio::test]
async fn commands_and_simulated_roles_share_one_run() {
    init_tracing();
    let plan = PlanBuilder::new()
        .concurrency(2)
        .role_cmd("coder-backend", r#"printf '{"built":"%s"}' "$WAVEDAG_TASK_ID""#)
        .role_cmd("code-reviewer", r#"printf '%s' "$WAVEDAG_UPSTREAM""#)
        .task(TaskBuilder::new("api", "coder-backend"))
        .task(TaskBuilder::new("docs", "writer"))
        .task(TaskBuilder::new("review", "code-reviewer").after("api"))
        .build();

    let fallback: Arc<dyn TaskRunner> = Arc::new(SimulatedRunner::new(Duration::from_millis(5)));
    let router = RoleRouter::from_plan(&plan, plan.settings().task_timeout, fallback);
    let graph = TaskGraph::build(plan.task_specs()).unwrap();

    let report = with_timeout(
        Scheduler::new(graph, Arc::new(router), plan.settings().scheduler_options()).run(),
    )
    .await;

    assert!(report.is_success(), "{report:#?}");
    let result = |id: &str| {
        report
            .tasks
            .iter()
            .find(|t| t.id() == id)
            .and_then(|t| t.result.clone())
            .unwrap()
    };
    assert_eq!(result("api"), json!({ "built": "api" }));
    assert_eq!(result("review"), json!({ "api": { "built": "api" } }));
    assert_eq!(result("docs")["agent"], "writer");
}

#[tokio::test]
async fn failing_command_blocks_its_dependents() {
    init_tracing();
    let plan = PlanBuilder::new()
        .role_cmd("coder-backend", "echo broken >&2; exit 2")
        .task(TaskBuilder::new("api", "coder-backend"))
        .task(TaskBuilder::new("review", "code-reviewer").after("api"))
        .build();

    let fallback: Arc<dyn TaskRunner> = Arc::new(SimulatedRunner::new(Duration::from_millis(1)));
    let router = RoleRouter::from_plan(&plan, None, fallback);
    let graph = TaskGraph::build(plan.task_specs()).unwrap();

    let report = with_timeout(
        Scheduler::new(graph, Arc::new(router), plan.settings().scheduler_options()).run(),
    )
    .await;

    assert_eq!(report.snapshot.state_of("api"), Some(TaskState::Failed));
    assert_eq!(report.snapshot.state_of("review"), Some(TaskState::Blocked));
    assert_eq!(
        report.snapshot.failed[0].error.as_deref(),
        Some("command exited with code 2")
    );
}

#[tokio::test]
async fn task_timeout_from_plan_fails_slow_commands() {
    init_tracing();
    let plan = PlanBuilder::new()
        .task_timeout("100ms")
        .role_cmd("coder-infra", "sleep 5")
        .task(TaskBuilder::new("infra", "coder-infra"))
        .build();

    let fallback: Arc<dyn TaskRunner> = Arc::new(SimulatedRunner::new(Duration::from_millis(1)));
    let router = RoleRouter::from_plan(&plan, plan.settings().task_timeout, fallback);
    let graph = TaskGraph::build(plan.task_specs()).unwrap();

    let report = with_timeout(
        Scheduler::new(graph, Arc::new(router), plan.settings().scheduler_options()).run(),
    )
    .await;

    let infra = &report.snapshot.failed[0];
    assert_eq!(infra.id, "infra");
    assert!(infra.error.as_deref().unwrap().contains("timed out"));
}

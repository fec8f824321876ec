// tests/integration/plan_loading.rs

use std::time::Duration;

use wavedag::config::{load_and_validate, load_from_path};
use wavedag::dag::TaskGraph;
use wavedag::engine::preview_waves;
use wavedag::fs::RealFileSystem;
use wavedag::fs::mock::MockFileSystem;
use wavedag_test_utils::{PlanBuilder, TaskBuilder};

const WEB_APP: &str = r#"
[config]
concurrency = 2
stall_threshold = "30m"
imbalance_margin = 1

[role.code-reviewer]
cmd = "scripts/review.sh"

[[task]]
id = "schema"
title = "Design database schema"
role = "coder-backend"
effort = "2h"

[[task]]
id = "api"
title = "Build REST API"
role = "coder-backend"
after = ["schema"]
effort = "6h"

[[task]]
id = "ui"
title = "Build UI"
role = "coder-frontend"
after = ["api"]

[[task]]
id = "infra"
title = "Provision infrastructure"
role = "coder-infra"

[[task]]
id = "review"
title = "Review"
role = "code-reviewer"
after = ["ui", "infra"]
"#;

#[test]
fn loads_real_file_from_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Wavedag.toml");
    std::fs::write(&path, WEB_APP).unwrap();

    let plan = load_and_validate(&RealFileSystem, &path).unwrap();

    let settings = plan.settings();
    assert_eq!(settings.concurrency, 2);
    assert_eq!(settings.stall_threshold, Duration::from_secs(30 * 60));
    assert_eq!(settings.imbalance_margin, 1);
    assert_eq!(settings.scheduler_options().tracker.imbalance_margin, 1);
    assert_eq!(plan.roles.len(), 1);

    let graph = TaskGraph::build(plan.task_specs()).unwrap();
    assert_eq!(graph.len(), 5);
    assert_eq!(graph.task("api").unwrap().spec.title, "Build REST API");
    assert_eq!(
        preview_waves(&graph, settings.concurrency),
        vec![
            vec!["schema".to_string(), "infra".to_string()],
            vec!["api".to_string()],
            vec!["ui".to_string()],
            vec!["review".to_string()],
        ]
    );
}

#[test]
fn raw_load_keeps_declaration_order() {
    let fs = MockFileSystem::new();
    fs.add_file("Wavedag.toml", WEB_APP);

    let raw = load_from_path(&fs, "Wavedag.toml").unwrap();
    let order: Vec<&str> = raw.task.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(order, vec!["schema", "api", "ui", "infra", "review"]);
}

#[test]
fn builder_produces_the_same_specs_as_toml() {
    let plan = PlanBuilder::new()
        .concurrency(2)
        .task(TaskBuilder::new("schema", "coder-backend").effort("2h"))
        .task(
            TaskBuilder::new("api", "coder-backend")
                .title("Build REST API")
                .after("schema"),
        )
        .build();

    let specs = plan.task_specs();
    assert_eq!(specs[0].effort, "2h");
    assert_eq!(specs[1].title, "Build REST API");
    assert_eq!(specs[1].dependencies, vec!["schema".to_string()]);
}

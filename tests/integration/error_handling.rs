// tests/integration/error_handling.rs

use std::collections::HashSet;
use std::io::Write;

use tempfile::NamedTempFile;
use wavedag::config::load_and_validate;
use wavedag::dag::{StructuralError, TaskGraph};
use wavedag::errors::WavedagError;
use wavedag::fs::RealFileSystem;

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn build(contents: &str) -> Result<TaskGraph, WavedagError> {
    let file = plan_file(contents);
    let plan = load_and_validate(&RealFileSystem, file.path()).unwrap();
    TaskGraph::build(plan.task_specs())
}

#[test]
fn cycle_returns_structured_error() {
    let result = build(
        r#"
[[task]]
id = "A"
role = "coder-backend"
after = ["B"]

[[task]]
id = "B"
role = "coder-backend"
after = ["A"]
"#,
    );

    match result {
        Err(WavedagError::Structural(errors)) => {
            assert_eq!(errors.len(), 1);
            let StructuralError::Cycle { path } = &errors[0] else {
                panic!("expected cycle, got {:?}", errors[0]);
            };
            let members: HashSet<&str> = path.iter().map(|s| s.as_str()).collect();
            assert_eq!(members, HashSet::from(["A", "B"]));
            assert!(errors[0].to_string().starts_with("dependency cycle: "));
        }
        Err(e) => panic!("Expected Structural error, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn every_structural_problem_is_reported_together() {
    let result = build(
        r#"
[[task]]
id = "A"
role = "planner"

[[task]]
id = "A"
role = "planner"

[[task]]
id = "B"
role = "coder-backend"
after = ["ghost"]

[[task]]
id = "C"
role = "coder-backend"
after = ["C"]
"#,
    );

    let err = result.unwrap_err();
    let errors = err.structural_errors().unwrap();
    assert!(errors.contains(&StructuralError::DuplicateId { id: "A".into() }));
    assert!(errors.contains(&StructuralError::MissingDependency {
        task: "B".into(),
        dependency: "ghost".into(),
    }));
    assert!(errors.contains(&StructuralError::Cycle {
        path: vec!["C".into()],
    }));
    assert_eq!(errors.len(), 3);

    let message = err.to_string();
    assert!(message.contains("3 problem(s)"));
    assert!(message.contains("unknown task 'ghost'"));
}

#[test]
fn unknown_field_type_is_a_toml_error() {
    let file = plan_file(
        r#"
[config]
concurrency = "many"

[[task]]
id = "A"
role = "planner"
"#,
    );

    let err = load_and_validate(&RealFileSystem, file.path()).unwrap_err();
    assert!(matches!(err, WavedagError::TomlError(_)), "got {err:?}");
}

#[test]
fn task_without_role_is_rejected() {
    let file = plan_file(
        r#"
[[task]]
id = "A"
"#,
    );

    let err = load_and_validate(&RealFileSystem, file.path()).unwrap_err();
    assert!(matches!(err, WavedagError::TomlError(_)), "got {err:?}");
}

#[test]
fn plan_without_tasks_is_a_config_error() {
    let file = plan_file(
        r#"
[config]
concurrency = 2
"#,
    );

    let err = load_and_validate(&RealFileSystem, file.path()).unwrap_err();
    assert!(matches!(err, WavedagError::ConfigError(_)), "got {err:?}");
}

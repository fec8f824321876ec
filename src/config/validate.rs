// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{PlanFile, PlanSettings, RawPlanFile};
use crate::errors::{Result, WavedagError};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = WavedagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        let settings = validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw, settings))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<PlanSettings> {
    ensure_has_tasks(plan)?;
    let settings = validate_global_config(plan)?;
    validate_roles(plan)?;
    validate_task_fields(plan)?;
    Ok(settings)
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(WavedagError::ConfigError(
            "plan must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<PlanSettings> {
    let cfg = &plan.config;

    if cfg.concurrency == 0 {
        return Err(WavedagError::ConfigError(
            "[config].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    let stall_threshold = parse_duration(&cfg.stall_threshold).map_err(|e| {
        WavedagError::ConfigError(format!("[config].stall_threshold: {e}"))
    })?;

    let task_timeout = match cfg.task_timeout.as_deref() {
        Some(s) => {
            let timeout = parse_duration(s)
                .map_err(|e| WavedagError::ConfigError(format!("[config].task_timeout: {e}")))?;
            if timeout.is_zero() {
                return Err(WavedagError::ConfigError(
                    "[config].task_timeout must be greater than zero".to_string(),
                ));
            }
            Some(timeout)
        }
        None => None,
    };

    Ok(PlanSettings {
        concurrency: cfg.concurrency,
        stall_threshold,
        imbalance_margin: cfg.imbalance_margin,
        task_timeout,
    })
}

fn validate_roles(plan: &RawPlanFile) -> Result<()> {
    for (name, role) in plan.role.iter() {
        if role.cmd.trim().is_empty() {
            return Err(WavedagError::ConfigError(format!(
                "[role.{name}].cmd must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_task_fields(plan: &RawPlanFile) -> Result<()> {
    for (pos, task) in plan.task.iter().enumerate() {
        if task.id.trim().is_empty() {
            return Err(WavedagError::ConfigError(format!(
                "task #{} has an empty id",
                pos + 1
            )));
        }
        if task.role.trim().is_empty() {
            return Err(WavedagError::ConfigError(format!(
                "task '{}' has an empty role",
                task.id
            )));
        }
    }
    Ok(())
}

/// Parse a duration such as `"500ms"`, `"30s"`, `"5m"` or `"24h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(60 * 60))),
        _ => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_src: &str) -> RawPlanFile {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration(" 24h "), Ok(Duration::from_secs(86_400)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("h").is_err());
    }

    #[test]
    fn defaults_apply_when_config_section_is_missing() {
        let plan = PlanFile::try_from(raw(
            r#"
            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap();

        let settings = plan.settings();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.stall_threshold, Duration::from_secs(86_400));
        assert_eq!(settings.imbalance_margin, 2);
        assert_eq!(settings.task_timeout, None);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = PlanFile::try_from(raw(
            r#"
            [config]
            concurrency = 0

            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn rejects_bad_durations() {
        let err = PlanFile::try_from(raw(
            r#"
            [config]
            stall_threshold = "soon"

            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("stall_threshold"));

        let err = PlanFile::try_from(raw(
            r#"
            [config]
            task_timeout = "0s"

            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("task_timeout"));
    }

    #[test]
    fn rejects_empty_plans_and_fields() {
        assert!(PlanFile::try_from(raw("")).is_err());

        let err = PlanFile::try_from(raw(
            r#"
            [[task]]
            id = "A"
            role = " "
            "#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("empty role"));

        let err = PlanFile::try_from(raw(
            r#"
            [role.planner]
            cmd = ""

            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("[role.planner]"));
    }

    #[test]
    fn structural_problems_are_left_to_the_graph() {
        // Duplicate ids and unknown deps pass here; TaskGraph::build reports them.
        let plan = PlanFile::try_from(raw(
            r#"
            [[task]]
            id = "A"
            role = "planner"
            after = ["ghost"]

            [[task]]
            id = "A"
            role = "planner"
            "#,
        ))
        .unwrap();
        let specs = plan.task_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].dependencies, vec!["ghost".to_string()]);
    }
}

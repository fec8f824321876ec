// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{Result, WavedagError};
use crate::fs::FileSystem;

/// Read and deserialize a plan file without semantic validation.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    if !fs.exists(path) {
        return Err(WavedagError::ConfigError(format!(
            "plan file not found: {}",
            path.display()
        )));
    }
    let contents = fs.read_to_string(path)?;
    let plan: RawPlanFile = toml::from_str(&contents)?;
    Ok(plan)
}

/// Read, deserialize and validate a plan file.
///
/// Checks global settings and task fields; the task graph itself is validated
/// by [`TaskGraph::build`](crate::dag::TaskGraph::build).
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(fs, path)?;
    PlanFile::try_from(raw)
}

/// `Wavedag.toml` in the current working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Wavedag.toml")
}

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::StructuralError;

#[derive(Error, Debug)]
pub enum WavedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The task graph failed validation; every problem found is listed.
    #[error("Invalid task graph ({} problem(s)): {}", .0.len(), join_errors(.0))]
    Structural(Vec<StructuralError>),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WavedagError {
    /// Structural problems carried by this error, if it is a validation failure.
    pub fn structural_errors(&self) -> Option<&[StructuralError]> {
        match self {
            WavedagError::Structural(errors) => Some(errors),
            _ => None,
        }
    }
}

fn join_errors(errors: &[StructuralError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WavedagError>;

//! Error types for the pipeline crate.

use std::fmt;

use climate_common::{ClimateError, ClimateResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage, named in every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Transform,
    Calibrate,
    Tiles,
    Derive,
    Lookup,
    Delete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::Calibrate => "calibrate",
            Stage::Tiles => "tiles",
            Stage::Derive => "derive",
            Stage::Lookup => "lookup",
            Stage::Delete => "delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while running a stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} failed for {key}: {source}")]
    Stage {
        stage: Stage,
        key: String,
        #[source]
        source: ClimateError,
    },

    #[error("{stage} task for {key} did not complete: {message}")]
    Task {
        stage: Stage,
        key: String,
        message: String,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Task { stage, .. } => *stage,
        }
    }

    /// Dataset key (or request label) the failure belongs to.
    pub fn key(&self) -> &str {
        match self {
            PipelineError::Stage { key, .. } | PipelineError::Task { key, .. } => key,
        }
    }

    pub fn climate_error(&self) -> Option<&ClimateError> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            PipelineError::Task { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.climate_error().map_or("TaskError", ClimateError::kind)
    }

    pub fn exit_code(&self) -> i32 {
        self.climate_error().map_or(1, ClimateError::exit_code)
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attach the failing stage and dataset to a [`ClimateResult`].
pub trait StageContext<T> {
    fn at(self, stage: Stage, key: impl fmt::Display) -> Result<T>;
}

impl<T> StageContext<T> for ClimateResult<T> {
    fn at(self, stage: Stage, key: impl fmt::Display) -> Result<T> {
        self.map_err(|source| PipelineError::Stage {
            stage,
            key: key.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_message_names_stage_and_key() {
        let result: ClimateResult<()> =
            Err(ClimateError::MissingData("month 4 has no time steps".into()));
        let err = result
            .at(Stage::Transform, "cmip5-rcp85-2040-2069-tavg-degC")
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Transform);
        assert_eq!(err.key(), "cmip5-rcp85-2040-2069-tavg-degC");
        assert_eq!(err.kind(), "MissingDataError");
        assert_eq!(err.exit_code(), 4);
        let message = err.to_string();
        assert!(message.starts_with("transform failed for cmip5-rcp85-2040-2069-tavg-degC"));
        assert!(message.contains("month 4"));
    }

    #[test]
    fn test_task_error_exit_code() {
        let err = PipelineError::Task {
            stage: Stage::Calibrate,
            key: "x".into(),
            message: "panicked".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.kind(), "TaskError");
    }
}

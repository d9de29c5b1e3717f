//! # Error Types
//!
//! Caller-facing error taxonomy for the pipeline scheduler.
//!
//! Execution-time failures (collection errors, per-item processing errors, unit
//! faults) never travel back through [`SchedulerError`]; they are retried by the
//! coordinator and end up on the pipeline record and in a failure template. See
//! [`crate::execution::ExecutionError`] for those.

use crate::config::ConfigurationError;
use crate::models::PipelineId;
use crate::state_machine::{PipelineStatus, StateMachineError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Rejected before admission: empty source, empty source id, bad batch entry
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No collector is registered for the requested source
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Pipeline {0} not found")]
    NotFound(PipelineId),

    /// Operation not valid for the pipeline's current status
    #[error("Pipeline {pipeline_id} is in invalid state {status} for this operation")]
    InvalidState {
        pipeline_id: PipelineId,
        status: PipelineStatus,
    },

    /// Internal invariant violation; indicates a scheduler bug
    #[error("Invalid transition for pipeline {pipeline_id}: {from} -> {to}")]
    InvalidTransition {
        pipeline_id: PipelineId,
        from: PipelineStatus,
        to: PipelineStatus,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scheduler is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Attach a pipeline id to a state machine error
    pub fn from_state_machine(pipeline_id: PipelineId, error: StateMachineError) -> Self {
        match error {
            StateMachineError::InvalidTransition { from, to } => Self::InvalidTransition {
                pipeline_id,
                from,
                to,
            },
        }
    }

    /// Whether the error was caused by the caller rather than the scheduler
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnsupportedSource(_)
                | Self::NotFound(_)
                | Self::InvalidState { .. }
        )
    }
}

impl From<ConfigurationError> for SchedulerError {
    fn from(error: ConfigurationError) -> Self {
        SchedulerError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_error_carries_pipeline_id() {
        let id = PipelineId::new();
        let error = SchedulerError::from_state_machine(
            id,
            StateMachineError::InvalidTransition {
                from: PipelineStatus::Completed,
                to: PipelineStatus::Running,
            },
        );

        assert_eq!(
            error,
            SchedulerError::InvalidTransition {
                pipeline_id: id,
                from: PipelineStatus::Completed,
                to: PipelineStatus::Running,
            }
        );
        assert!(!error.is_caller_error());
        assert!(error.to_string().contains("completed -> running"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(SchedulerError::InvalidArgument("source".into()).is_caller_error());
        assert!(SchedulerError::UnsupportedSource("myspace".into()).is_caller_error());
        assert!(!SchedulerError::ShuttingDown.is_caller_error());
    }
}

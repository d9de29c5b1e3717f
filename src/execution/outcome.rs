use super::errors::ExecutionError;
use crate::models::{PipelineId, PipelineResult};

/// How one execution attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(PipelineResult),
    Failed {
        error: ExecutionError,
        /// Results gathered before the failure, if any were
        partial: Option<PipelineResult>,
    },
    /// The unit observed its cancellation token at a batch boundary
    Cancelled { partial: Option<PipelineResult> },
}

impl ExecutionOutcome {
    pub fn outcome_type(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Any result the attempt produced, complete or partial
    pub fn into_result(self) -> Option<PipelineResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { partial, .. } | Self::Cancelled { partial } => partial,
        }
    }
}

/// Messages from execution units back to the coordinator.
///
/// `attempt` lets the coordinator ignore messages from an attempt it has already
/// finalized.
#[derive(Debug)]
pub(crate) enum UnitMessage {
    Progress {
        pipeline_id: PipelineId,
        attempt: u32,
        percent: u8,
        processed_items: usize,
        total_items: usize,
    },
    Finished {
        pipeline_id: PipelineId,
        attempt: u32,
        outcome: ExecutionOutcome,
    },
}

use super::states::PipelineStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineStatus,
        to: PipelineStatus,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

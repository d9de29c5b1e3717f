use super::{
    errors::{StateMachineError, StateMachineResult},
    events::PipelineEvent,
    states::PipelineStatus,
};

/// Status an event moves a pipeline into, regardless of where it starts
pub fn target_state(event: &PipelineEvent) -> PipelineStatus {
    match event {
        PipelineEvent::Start => PipelineStatus::Running,
        PipelineEvent::Complete(_) => PipelineStatus::Completed,
        PipelineEvent::Retry { .. } => PipelineStatus::Retrying,
        PipelineEvent::Requeue => PipelineStatus::Queued,
        PipelineEvent::Fail { .. } => PipelineStatus::Failed,
        PipelineEvent::Stop { .. } => PipelineStatus::Stopped,
    }
}

/// Whether `from -> to` is an edge of the lifecycle graph
pub fn is_valid_transition(from: PipelineStatus, to: PipelineStatus) -> bool {
    use PipelineStatus::*;

    matches!(
        (from, to),
        (Queued, Running)
            | (Queued, Stopped)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Retrying)
            | (Running, Stopped)
            | (Retrying, Queued)
            | (Retrying, Stopped)
    )
}

/// Determine the target state for `event` from `current`, rejecting invalid edges
pub fn determine_target_state(
    current: PipelineStatus,
    event: &PipelineEvent,
) -> StateMachineResult<PipelineStatus> {
    let target = target_state(event);
    if is_valid_transition(current, target) {
        Ok(target)
    } else {
        Err(StateMachineError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

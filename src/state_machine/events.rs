use crate::models::PipelineResult;

/// Events that drive pipeline state transitions.
///
/// Each event carries the fields the registry writes alongside the new status.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Admission: an execution unit is being started
    Start,
    /// The attempt succeeded
    Complete(PipelineResult),
    /// The attempt failed and the retry budget allows another one
    Retry {
        error: String,
        partial: Option<PipelineResult>,
    },
    /// The retry delay elapsed; back into the queue
    Requeue,
    /// The attempt failed and no retries are left
    Fail {
        error: String,
        partial: Option<PipelineResult>,
    },
    /// Stopped by a caller or by shutdown
    Stop { partial: Option<PipelineResult> },
}

impl PipelineEvent {
    pub fn stop() -> Self {
        Self::Stop { partial: None }
    }
}

// State machine module for pipeline lifecycle management
//
// queued -> running -> {completed | failed | retrying | stopped}
// retrying -> queued (after the retry delay) | stopped
// queued -> stopped

pub mod errors;
pub mod events;
pub mod pipeline_state_machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::PipelineEvent;
pub use pipeline_state_machine::{determine_target_state, is_valid_transition, target_state};
pub use states::PipelineStatus;

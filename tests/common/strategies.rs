use feedpulse_core::models::Priority;
use feedpulse_core::state_machine::PipelineEvent;
use feedpulse_core::models::PipelineResult;
use proptest::prelude::*;

/// Strategy for generating priorities
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::High), Just(Priority::Normal), Just(Priority::Low)]
}

/// Strategy for generating (priority, sequence) submissions with unique sequences
pub fn submissions_strategy() -> impl Strategy<Value = Vec<Priority>> {
    prop::collection::vec(priority_strategy(), 0..64)
}

/// Strategy for generating lifecycle events
pub fn pipeline_event_strategy() -> impl Strategy<Value = PipelineEvent> {
    prop_oneof![
        Just(PipelineEvent::Start),
        Just(PipelineEvent::Complete(PipelineResult::default())),
        Just(PipelineEvent::Retry {
            error: "ETIMEDOUT".to_string(),
            partial: None,
        }),
        Just(PipelineEvent::Requeue),
        Just(PipelineEvent::Fail {
            error: "rate limit exceeded".to_string(),
            partial: None,
        }),
        Just(PipelineEvent::stop()),
    ]
}

/// Strategy for generating error messages mixing known markers and noise
pub fn error_message_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![
            Just(""),
            Just("rate limit exceeded"),
            Just("request timed out"),
            Just("invalid api key"),
            Just("ECONNRESET"),
        ],
        "[a-z ]{0,20}",
        prop::option::of(100u16..600),
    )
        .prop_map(|(marker, noise, code)| match code {
            Some(code) => format!("{noise} {marker} HTTP {code}"),
            None => format!("{noise} {marker}"),
        })
}

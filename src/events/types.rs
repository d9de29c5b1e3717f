use crate::constants::events as names;
use crate::models::{FailureTemplate, PipelineId, Priority};
use crate::state_machine::PipelineStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Discriminant of [`LifecycleEvent`], used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Queued,
    Started,
    Progress,
    Completed,
    Retrying,
    Failed,
    Stopped,
    FailureTemplateCreated,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::Queued,
        Self::Started,
        Self::Progress,
        Self::Completed,
        Self::Retrying,
        Self::Failed,
        Self::Stopped,
        Self::FailureTemplateCreated,
    ];

    /// Dotted event name used in logs and telemetry labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => names::PIPELINE_QUEUED,
            Self::Started => names::PIPELINE_STARTED,
            Self::Progress => names::PIPELINE_PROGRESS,
            Self::Completed => names::PIPELINE_COMPLETED,
            Self::Retrying => names::PIPELINE_RETRYING,
            Self::Failed => names::PIPELINE_FAILED,
            Self::Stopped => names::PIPELINE_STOPPED,
            Self::FailureTemplateCreated => names::FAILURE_TEMPLATE_CREATED,
        }
    }
}

/// Lifecycle events published to external subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Queued {
        pipeline_id: PipelineId,
        priority: Priority,
        retry_count: u32,
        timestamp: DateTime<Utc>,
    },
    Started {
        pipeline_id: PipelineId,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    Progress {
        pipeline_id: PipelineId,
        percent: u8,
        processed_items: usize,
        total_items: usize,
        timestamp: DateTime<Utc>,
    },
    Completed {
        pipeline_id: PipelineId,
        processing_time_ms: u64,
        succeeded_items: usize,
        failed_items: usize,
        timestamp: DateTime<Utc>,
    },
    Retrying {
        pipeline_id: PipelineId,
        retry_count: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Failed {
        pipeline_id: PipelineId,
        retry_count: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Stopped {
        pipeline_id: PipelineId,
        timestamp: DateTime<Utc>,
    },
    FailureTemplateCreated {
        template: Box<FailureTemplate>,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Queued { .. } => EventKind::Queued,
            Self::Started { .. } => EventKind::Started,
            Self::Progress { .. } => EventKind::Progress,
            Self::Completed { .. } => EventKind::Completed,
            Self::Retrying { .. } => EventKind::Retrying,
            Self::Failed { .. } => EventKind::Failed,
            Self::Stopped { .. } => EventKind::Stopped,
            Self::FailureTemplateCreated { .. } => EventKind::FailureTemplateCreated,
        }
    }

    pub fn pipeline_id(&self) -> PipelineId {
        match self {
            Self::Queued { pipeline_id, .. }
            | Self::Started { pipeline_id, .. }
            | Self::Progress { pipeline_id, .. }
            | Self::Completed { pipeline_id, .. }
            | Self::Retrying { pipeline_id, .. }
            | Self::Failed { pipeline_id, .. }
            | Self::Stopped { pipeline_id, .. } => *pipeline_id,
            Self::FailureTemplateCreated { template } => template.pipeline_id,
        }
    }

    /// Status the pipeline entered, for events emitted by a transition
    pub fn status(&self) -> Option<PipelineStatus> {
        match self {
            Self::Queued { .. } => Some(PipelineStatus::Queued),
            Self::Started { .. } => Some(PipelineStatus::Running),
            Self::Completed { .. } => Some(PipelineStatus::Completed),
            Self::Retrying { .. } => Some(PipelineStatus::Retrying),
            Self::Failed { .. } => Some(PipelineStatus::Failed),
            Self::Stopped { .. } => Some(PipelineStatus::Stopped),
            Self::Progress { .. } | Self::FailureTemplateCreated { .. } => None,
        }
    }
}

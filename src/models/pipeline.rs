use crate::error::{Result, SchedulerError};
use crate::models::item::PipelineResult;
use crate::state_machine::PipelineStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Opaque pipeline identifier, generated at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PipelineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for PipelineId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Priority bucket governing dequeue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Dequeue rank; lower ranks dequeue first
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

/// A request to run one collect-then-process pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Platform to collect from, e.g. `youtube`
    pub source: String,
    /// What to collect on that platform, e.g. a video id or search query
    pub source_id: String,
    /// Passed through untouched to the collector
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub priority: Priority,
}

impl PipelineRequest {
    pub fn new(source: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_id: source_id.into(),
            options: Value::Null,
            priority: Priority::Normal,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Reject requests with a blank source or source id
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "source must not be empty".to_string(),
            ));
        }
        if self.source_id.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "source_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One unit of scheduled work and its lifecycle bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub source: String,
    pub source_id: String,
    pub options: Value,
    /// Fixed at submission; retries reuse it
    pub priority: Priority,
    pub status: PipelineStatus,
    /// Incremented on every requeue after a failed attempt
    pub retry_count: u32,
    /// Number of times an execution unit was started for this pipeline
    pub attempts: u32,
    /// Submission order, used as the FIFO key inside a priority bucket
    pub sequence: u64,

    pub created_at: DateTime<Utc>,
    /// First admission; not reset by retries
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,

    pub processed_items: usize,
    pub total_items: usize,
    /// Highest progress percentage reported by any attempt
    pub progress: u8,

    /// Populated only on success
    pub result: Option<PipelineResult>,
    /// Results gathered before a failure or stop
    pub partial_result: Option<PipelineResult>,
    /// Terminal failure message
    pub error: Option<String>,
    /// Most recent attempt failure, kept across retries
    pub last_error: Option<String>,
}

impl Pipeline {
    /// Build a freshly queued pipeline from a validated request
    pub fn new(id: PipelineId, request: PipelineRequest, sequence: u64) -> Self {
        Self {
            id,
            source: request.source,
            source_id: request.source_id,
            options: request.options,
            priority: request.priority,
            status: PipelineStatus::Queued,
            retry_count: 0,
            attempts: 0,
            sequence,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            stopped_at: None,
            processed_items: 0,
            total_items: 0,
            progress: 0,
            result: None,
            partial_result: None,
            error: None,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time at which the pipeline reached its terminal state, if it has
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            PipelineStatus::Completed => self.completed_at,
            PipelineStatus::Failed => self.failed_at,
            PipelineStatus::Stopped => self.stopped_at,
            _ => None,
        }
    }
}

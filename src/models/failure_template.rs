use crate::models::pipeline::{Pipeline, PipelineId, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Snapshot of a pipeline taken at the moment it failed permanently.
///
/// Templates keep their own copy so the registry sweep can drop the pipeline
/// record without invalidating stored templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureContext {
    pub source: String,
    pub source_id: String,
    pub priority: Priority,
    pub options: Value,
    pub retry_count: u32,
    pub attempts: u32,
    pub processed_items: usize,
    pub total_items: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<&Pipeline> for FailureContext {
    fn from(pipeline: &Pipeline) -> Self {
        Self {
            source: pipeline.source.clone(),
            source_id: pipeline.source_id.clone(),
            priority: pipeline.priority,
            options: pipeline.options.clone(),
            retry_count: pipeline.retry_count,
            attempts: pipeline.attempts,
            processed_items: pipeline.processed_items,
            total_items: pipeline.total_items,
            created_at: pipeline.created_at,
            started_at: pipeline.started_at,
            failed_at: pipeline.failed_at,
        }
    }
}

/// Immutable record of one permanent failure, used for pattern analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureTemplate {
    pub id: Uuid,
    pub pipeline_id: PipelineId,
    /// Tags such as `RATE_LIMIT_ERROR` or `HTTP_503`; may be empty
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
    pub error: String,
    pub context: FailureContext,
    pub created_at: DateTime<Utc>,
}

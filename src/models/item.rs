use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A short text item returned by a collector (comment, chat message, post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl SourceItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Output of the processing stage for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub item_id: String,
    pub output: Value,
}

/// A single item that failed processing; recorded without aborting its batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub error: String,
}

/// Aggregated result of one execution attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub items: Vec<ProcessedItem>,
    pub failed_items: Vec<ItemFailure>,
    pub total_items: usize,
    /// Wall time of the attempt that produced this result
    pub processing_time_ms: u64,
}

impl PipelineResult {
    pub fn with_total(total_items: usize) -> Self {
        Self {
            total_items,
            ..Self::default()
        }
    }

    pub fn processed_count(&self) -> usize {
        self.items.len() + self.failed_items.len()
    }

    pub fn success_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.failed_items.is_empty()
    }
}

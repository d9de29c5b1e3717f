//! Collaborator seams consumed by execution units.
//!
//! Both traits must be safe to call concurrently for distinct pipelines; a single
//! instance is shared by every unit through an `Arc`.

use super::errors::StageError;
use crate::models::SourceItem;
use async_trait::async_trait;
use serde_json::Value;

/// Fetches items for one source/source id pair
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    async fn collect(
        &self,
        source: &str,
        source_id: &str,
        options: &Value,
    ) -> Result<Vec<SourceItem>, StageError>;
}

/// Runs the analysis stages for a single item
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError>;
}

/// Processor that returns each item's content and metadata unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl Processor for PassthroughProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        Ok(serde_json::json!({
            "content": item.content,
            "metadata": item.metadata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_processor_echoes_content() {
        let item = SourceItem::new("c1", "great video")
            .with_metadata(serde_json::json!({"author": "someone"}));
        let output = PassthroughProcessor.process(&item).await.unwrap();
        assert_eq!(output["content"], "great video");
        assert_eq!(output["metadata"]["author"], "someone");
    }
}

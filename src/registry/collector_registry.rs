//! # Collector Registry
//!
//! Maps source names (`youtube`, `twitter`, ...) to the collector that serves them.
//! Submissions for a source with no registered collector are rejected with
//! `UnsupportedSource` before a pipeline record is created.

use crate::execution::Collector;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Thread-safe source → collector map; registration may happen at any time
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: Arc<DashMap<String, Arc<dyn Collector>>>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `collector` for `source`, replacing any previous registration
    pub fn register(&self, source: impl Into<String>, collector: Arc<dyn Collector>) {
        let source = source.into();
        let replaced = self.collectors.insert(source.clone(), collector).is_some();
        info!(source = %source, replaced, "REGISTRY: collector registered");
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.get(source).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.collectors.contains_key(source)
    }

    pub fn remove(&self, source: &str) -> bool {
        let removed = self.collectors.remove(source).is_some();
        if removed {
            info!(source = %source, "REGISTRY: collector unregistered");
        }
        removed
    }

    /// Registered source names, sorted
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .collectors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        sources.sort();
        sources
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StageError;
    use crate::models::SourceItem;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EmptyCollector;

    #[async_trait]
    impl Collector for EmptyCollector {
        async fn collect(
            &self,
            _source: &str,
            _source_id: &str,
            _options: &Value,
        ) -> Result<Vec<SourceItem>, StageError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = CollectorRegistry::new();
        assert!(registry.is_empty());

        registry.register("youtube", Arc::new(EmptyCollector));
        registry.register("discord", Arc::new(EmptyCollector));

        assert!(registry.contains("youtube"));
        assert!(registry.get("twitch").is_none());
        assert_eq!(registry.sources(), vec!["discord", "youtube"]);
    }

    #[test]
    fn test_reregister_replaces_and_remove() {
        let registry = CollectorRegistry::new();
        registry.register("youtube", Arc::new(EmptyCollector));
        registry.register("youtube", Arc::new(EmptyCollector));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("youtube"));
        assert!(!registry.remove("youtube"));
        assert!(!registry.contains("youtube"));
    }

    #[test]
    fn test_clones_share_registrations() {
        let registry = CollectorRegistry::new();
        let clone = registry.clone();
        clone.register("twitter", Arc::new(EmptyCollector));
        assert!(registry.contains("twitter"));
    }
}

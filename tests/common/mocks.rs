//! Mock collaborators for scheduler integration tests.

use async_trait::async_trait;
use feedpulse_core::execution::{Collector, Processor, StageError};
use feedpulse_core::models::SourceItem;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn items(source_id: &str, count: usize) -> Vec<SourceItem> {
    (0..count)
        .map(|i| SourceItem::new(format!("{source_id}-{i}"), format!("comment {i} on {source_id}")))
        .collect()
}

/// Returns `count` items for every source id
#[derive(Debug, Default)]
pub struct StaticCollector {
    pub count: usize,
    pub calls: AtomicUsize,
}

impl StaticCollector {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            count,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for StaticCollector {
    async fn collect(
        &self,
        _source: &str,
        source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(items(source_id, self.count))
    }
}

/// Always fails with the configured error
#[derive(Debug)]
pub struct FailingCollector {
    pub error: StageError,
    pub calls: AtomicUsize,
}

impl FailingCollector {
    pub fn new(error: impl Into<StageError>) -> Arc<Self> {
        Arc::new(Self {
            error: error.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FailingCollector {
    async fn collect(
        &self,
        _source: &str,
        _source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Fails the first `failures` calls, then returns `count` items
#[derive(Debug)]
pub struct FlakyCollector {
    pub failures: usize,
    pub count: usize,
    pub calls: AtomicUsize,
}

impl FlakyCollector {
    pub fn new(failures: usize, count: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            count,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FlakyCollector {
    async fn collect(
        &self,
        _source: &str,
        source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(StageError::new("connect ECONNRESET").with_code("ECONNRESET"))
        } else {
            Ok(items(source_id, self.count))
        }
    }
}

/// Blocks every collect call until the test releases a permit.
///
/// Records the order in which source ids entered `collect` and the highest number
/// of calls in flight at once.
#[derive(Debug)]
pub struct GatedCollector {
    gate: Semaphore,
    count: usize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    entered: Mutex<Vec<String>>,
}

impl GatedCollector {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            count,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            entered: Mutex::new(Vec::new()),
        })
    }

    /// Let `n` blocked or future collect calls through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn entered(&self) -> Vec<String> {
        self.entered.lock().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for GatedCollector {
    async fn collect(
        &self,
        _source: &str,
        source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        self.entered.lock().push(source_id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match permit {
            Ok(permit) => {
                permit.forget();
                Ok(items(source_id, self.count))
            }
            Err(_) => Err(StageError::new("gate closed")),
        }
    }
}

/// Never returns
#[derive(Debug, Default)]
pub struct StuckCollector;

#[async_trait]
impl Collector for StuckCollector {
    async fn collect(
        &self,
        _source: &str,
        _source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        std::future::pending().await
    }
}

/// Upper-cases content; fails items whose content starts with "fail"
#[derive(Debug, Default)]
pub struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        if item.content.starts_with("fail") {
            return Err(StageError::new(format!("sentiment model rejected {}", item.id)));
        }
        Ok(serde_json::json!({
            "text": item.content.to_uppercase(),
            "sentiment": 0.5,
        }))
    }
}

/// Fails every item
#[derive(Debug, Default)]
pub struct RejectingProcessor;

#[async_trait]
impl Processor for RejectingProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        Err(StageError::new(format!("translation unavailable for {}", item.id)))
    }
}

/// Sleeps for `delay` per item
#[derive(Debug)]
pub struct SlowProcessor {
    pub delay: Duration,
}

#[async_trait]
impl Processor for SlowProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::String(item.content.clone()))
    }
}

/// Panics when it sees content starting with "panic"
#[derive(Debug, Default)]
pub struct PanickingProcessor;

#[async_trait]
impl Processor for PanickingProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        if item.content.starts_with("panic") {
            panic!("language detector crashed on {}", item.id);
        }
        Ok(Value::String(item.content.clone()))
    }
}

/// Returns items whose content is the source id itself, so processors can key off it
#[derive(Debug, Default)]
pub struct MirrorCollector;

#[async_trait]
impl Collector for MirrorCollector {
    async fn collect(
        &self,
        _source: &str,
        source_id: &str,
        _options: &Value,
    ) -> Result<Vec<SourceItem>, StageError> {
        Ok(vec![SourceItem::new(format!("{source_id}-0"), source_id)])
    }
}

/// Busy-waits for `spin` per item without ever yielding to the runtime
#[derive(Debug)]
pub struct SpinningProcessor {
    pub spin: Duration,
    pub started: AtomicUsize,
}

impl SpinningProcessor {
    pub fn new(spin: Duration) -> Arc<Self> {
        Arc::new(Self {
            spin,
            started: AtomicUsize::new(0),
        })
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for SpinningProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let begin = std::time::Instant::now();
        while begin.elapsed() < self.spin {
            std::hint::spin_loop();
        }
        Ok(Value::String(item.content.clone()))
    }
}

/// Fails the first `failures` items it sees, then echoes content
#[derive(Debug)]
pub struct FlakyProcessor {
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyProcessor {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    async fn process(&self, item: &SourceItem) -> Result<Value, StageError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StageError::new("sentiment service returned HTTP 503").with_status_code(503));
        }
        Ok(Value::String(item.content.clone()))
    }
}

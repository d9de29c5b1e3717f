//! # Pipeline Telemetry
//!
//! OpenTelemetry instruments for pipeline lifecycle operations:
//! - Lifecycle counters (submitted, completed, retried, failed, stopped)
//! - Processing duration histogram
//!
//! Instruments come from the global meter provider, which is a no-op until the
//! host application installs one (OTLP exporter, Prometheus bridge, ...).
//!
//! ## Usage
//!
//! ```rust
//! use feedpulse_core::telemetry;
//!
//! telemetry::record_submitted("youtube");
//! telemetry::record_completed("youtube", 1_250);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

/// Lazy-initialized meter for pipeline metrics
static PIPELINE_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    PIPELINE_METER.get_or_init(|| opentelemetry::global::meter("feedpulse-core"))
}

/// Total number of pipelines accepted by `submit`
///
/// Labels:
/// - source: platform the pipeline collects from
pub fn pipelines_submitted_total() -> Counter<u64> {
    meter()
        .u64_counter("feedpulse.pipelines.submitted.total")
        .with_description("Total number of pipelines submitted")
        .build()
}

/// Total number of pipelines that completed successfully
pub fn pipelines_completed_total() -> Counter<u64> {
    meter()
        .u64_counter("feedpulse.pipelines.completed.total")
        .with_description("Total number of pipelines completed successfully")
        .build()
}

/// Total number of failed attempts that were scheduled for retry
pub fn pipelines_retried_total() -> Counter<u64> {
    meter()
        .u64_counter("feedpulse.pipelines.retried.total")
        .with_description("Total number of pipeline retries scheduled")
        .build()
}

/// Total number of pipelines that failed permanently
///
/// Labels:
/// - source: platform the pipeline collects from
/// - pattern: first failure pattern tag, or `UNCLASSIFIED`
pub fn pipelines_failed_total() -> Counter<u64> {
    meter()
        .u64_counter("feedpulse.pipelines.failed.total")
        .with_description("Total number of pipelines failed permanently")
        .build()
}

/// Total number of pipelines stopped by callers or shutdown
pub fn pipelines_stopped_total() -> Counter<u64> {
    meter()
        .u64_counter("feedpulse.pipelines.stopped.total")
        .with_description("Total number of pipelines stopped")
        .build()
}

/// Processing time of successful attempts in milliseconds
pub fn pipeline_processing_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("feedpulse.pipelines.processing_duration")
        .with_description("Processing time of successful pipeline attempts")
        .with_unit("ms")
        .build()
}

pub fn record_submitted(source: &str) {
    pipelines_submitted_total().add(1, &[KeyValue::new("source", source.to_string())]);
}

pub fn record_completed(source: &str, processing_time_ms: u64) {
    let labels = [KeyValue::new("source", source.to_string())];
    pipelines_completed_total().add(1, &labels);
    pipeline_processing_duration().record(processing_time_ms as f64, &labels);
}

pub fn record_retried(source: &str) {
    pipelines_retried_total().add(1, &[KeyValue::new("source", source.to_string())]);
}

pub fn record_failed(source: &str, pattern: Option<&str>) {
    pipelines_failed_total().add(
        1,
        &[
            KeyValue::new("source", source.to_string()),
            KeyValue::new("pattern", pattern.unwrap_or("UNCLASSIFIED").to_string()),
        ],
    );
}

pub fn record_stopped(source: &str) {
    pipelines_stopped_total().add(1, &[KeyValue::new("source", source.to_string())]);
}

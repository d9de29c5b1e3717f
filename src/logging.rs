//! # Structured Logging Module
//!
//! Environment-aware structured logging for the scheduler and its execution units.
//!
//! The environment is read from `FEEDPULSE_ENV` (falling back to `APP_ENV`, then
//! `development`). `RUST_LOG` overrides the environment's default level, and
//! `FEEDPULSE_LOG_FORMAT=json` switches the console output to JSON lines.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging; later calls are no-ops
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if use_json_format() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(environment != "production")
                .boxed()
        };

        // Use try_init so an embedding application's subscriber wins
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FEEDPULSE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var("FEEDPULSE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for pipeline operations
pub fn log_pipeline_operation(
    operation: &str,
    pipeline_id: Option<&str>,
    source: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        pipeline_id = pipeline_id,
        source = source,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PIPELINE_OPERATION"
    );
}

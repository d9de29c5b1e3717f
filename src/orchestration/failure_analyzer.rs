//! # Failure Pattern Analyzer
//!
//! Classifies permanent pipeline failures into a fixed tag taxonomy and keeps a
//! bounded rolling window of [`FailureTemplate`]s for aggregate reporting.
//!
//! ## Overview
//!
//! Tags are derived from the error's text and, when present, its numeric status code:
//!
//! | Tag | Triggered by |
//! |---|---|
//! | `TIMEOUT_ERROR` | "timeout", "timed out", `ETIMEDOUT`, status 408/504 |
//! | `RATE_LIMIT_ERROR` | "rate limit", "too many requests", "quota", status 429 |
//! | `AUTH_ERROR` | "unauthorized", "forbidden", "auth", "token", "api key", status 401/403 |
//! | `NETWORK_ERROR` | "network", "connection", "socket", "dns", `ECONNREFUSED`, ... |
//! | `HTTP_<code>` | any status code in the error or the message |
//!
//! Exactly one template is produced per permanent failure, even when no tag matches.
//! Reports are computed on demand from the retained templates.
//!
//! ## Usage
//!
//! ```rust
//! use feedpulse_core::orchestration::FailurePatternAnalyzer;
//!
//! let analyzer = FailurePatternAnalyzer::new();
//! let patterns = analyzer.extract_patterns("HTTP 429: rate limit exceeded", None);
//! assert_eq!(patterns, vec!["RATE_LIMIT_ERROR", "HTTP_429"]);
//! ```

use crate::constants::patterns::{
    AUTH_ERROR, HTTP_PREFIX, NETWORK_ERROR, RATE_LIMIT_ERROR, TIMEOUT_ERROR,
};
use crate::execution::ExecutionError;
use crate::models::{FailureContext, FailureTemplate, Pipeline};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "etimedout", "deadline exceeded"];
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "ratelimit",
    "rate-limit",
    "too many requests",
    "quota",
    "throttl",
];
const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "unauthorised",
    "forbidden",
    "auth",
    "token",
    "api key",
    "apikey",
    "credential",
    "permission denied",
];
const NETWORK_MARKERS: &[&str] = &[
    "network",
    "econnrefused",
    "econnreset",
    "enotfound",
    "ehostunreach",
    "connection",
    "socket",
    "dns",
];

/// Tags checked in this order; output keeps it
const TAXONOMY: &[(&str, &[&str])] = &[
    (TIMEOUT_ERROR, TIMEOUT_MARKERS),
    (RATE_LIMIT_ERROR, RATE_LIMIT_MARKERS),
    (AUTH_ERROR, AUTH_MARKERS),
    (NETWORK_ERROR, NETWORK_MARKERS),
];

#[derive(Debug, Clone)]
pub struct FailurePatternAnalyzer {
    /// `None` only if the pattern failed to compile; text codes are then ignored
    status_code: Option<Regex>,
}

impl Default for FailurePatternAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FailurePatternAnalyzer {
    pub fn new() -> Self {
        Self {
            // "HTTP 503", "HTTP/1.1 404", "status 429", "status code: 500", "HTTP_502"
            status_code: Regex::new(
                r"(?i)\b(?:http(?:/\d(?:\.\d)?)?|status(?:\s+code)?)[\s_:=]*([1-5]\d{2})\b",
            )
            .ok(),
        }
    }

    /// Tag an error message; `status_code` takes precedence over one found in the text
    pub fn extract_patterns(&self, message: &str, status_code: Option<u16>) -> Vec<String> {
        let lower = message.to_lowercase();
        let code = status_code.or_else(|| self.status_code_in(message));

        let mut patterns: Vec<String> = TAXONOMY
            .iter()
            .filter(|(tag, markers)| {
                markers.iter().any(|marker| lower.contains(marker))
                    || code.is_some_and(|code| implied_tag(code) == Some(*tag))
            })
            .map(|(tag, _)| (*tag).to_string())
            .collect();

        if let Some(code) = code {
            patterns.push(format!("{HTTP_PREFIX}{code}"));
        }
        patterns
    }

    fn status_code_in(&self, message: &str) -> Option<u16> {
        self.status_code
            .as_ref()?
            .captures(message)
            .and_then(|captures| captures.get(1))
            .and_then(|code| code.as_str().parse().ok())
    }

    /// Static recommendations for a set of tags
    pub fn recommendations(&self, patterns: &[String]) -> Vec<String> {
        let mut recommendations: Vec<String> = patterns
            .iter()
            .filter_map(|pattern| recommendation_for(pattern))
            .map(str::to_string)
            .collect();
        recommendations.dedup();

        if recommendations.is_empty() {
            recommendations.push(
                "Inspect the pipeline's last error and the collector logs for the root cause"
                    .to_string(),
            );
        }
        recommendations
    }

    /// Build the template for a permanently failed pipeline
    pub fn analyze(&self, pipeline: &Pipeline, error: &ExecutionError) -> FailureTemplate {
        let text = match error.stage_error() {
            Some(stage) => format!("{error} {}", stage.describe()),
            None => error.to_string(),
        };
        let patterns = self.extract_patterns(&text, error.status_code());
        let recommendations = self.recommendations(&patterns);

        FailureTemplate {
            id: Uuid::new_v4(),
            pipeline_id: pipeline.id,
            patterns,
            recommendations,
            error: error.to_string(),
            context: FailureContext::from(pipeline),
            created_at: Utc::now(),
        }
    }
}

fn implied_tag(status_code: u16) -> Option<&'static str> {
    match status_code {
        408 | 504 => Some(TIMEOUT_ERROR),
        429 => Some(RATE_LIMIT_ERROR),
        401 | 403 => Some(AUTH_ERROR),
        502 | 503 => Some(NETWORK_ERROR),
        _ => None,
    }
}

fn recommendation_for(pattern: &str) -> Option<&'static str> {
    match pattern {
        TIMEOUT_ERROR => Some("Increase the collector timeout or reduce the requested page size"),
        RATE_LIMIT_ERROR => Some(
            "Reduce request frequency for this source or switch to exponential back-off",
        ),
        AUTH_ERROR => Some("Verify the API credentials configured for this source"),
        NETWORK_ERROR => Some("Check network connectivity and the source platform's status"),
        p if p.starts_with(HTTP_PREFIX) => match p.get(HTTP_PREFIX.len()..HTTP_PREFIX.len() + 1) {
            Some("5") => Some("The source platform returned a server error; retry later"),
            Some("4") => Some("The source platform rejected the request; check the source id and options"),
            _ => None,
        },
        _ => None,
    }
}

/// Occurrences of one tag across retained templates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternCount {
    pub pattern: String,
    pub count: usize,
    /// Share of all retained failures carrying this tag, 0..=100
    pub percentage: f64,
}

/// Read-only projection over retained failure templates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub total_failures: usize,
    /// Failures with no tag at all
    pub unclassified: usize,
    /// Sorted by count, descending, then by tag name
    pub by_pattern: Vec<PatternCount>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

/// Bounded rolling window of failure templates, by count and by age
#[derive(Debug)]
pub struct FailureTemplateStore {
    templates: VecDeque<FailureTemplate>,
    capacity: usize,
    max_age: Duration,
}

impl FailureTemplateStore {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            templates: VecDeque::new(),
            capacity,
            max_age,
        }
    }

    pub fn push(&mut self, template: FailureTemplate) {
        if self.capacity == 0 {
            return;
        }
        while self.templates.len() >= self.capacity {
            self.templates.pop_front();
        }
        self.templates.push_back(template);
    }

    /// Drop templates older than the max age; returns how many were removed
    pub fn prune(&mut self) -> usize {
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };

        let before = self.templates.len();
        while self
            .templates
            .front()
            .is_some_and(|template| template.created_at < cutoff)
        {
            self.templates.pop_front();
        }
        before - self.templates.len()
    }

    /// Retained templates, oldest first
    pub fn templates(&self) -> Vec<FailureTemplate> {
        self.templates.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn report(&self) -> FailureReport {
        let total_failures = self.templates.len();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut unclassified = 0;

        for template in &self.templates {
            if template.patterns.is_empty() {
                unclassified += 1;
            }
            for pattern in &template.patterns {
                *counts.entry(pattern.as_str()).or_default() += 1;
            }
        }

        let mut by_pattern: Vec<PatternCount> = counts
            .into_iter()
            .map(|(pattern, count)| PatternCount {
                pattern: pattern.to_string(),
                count,
                percentage: count as f64 * 100.0 / total_failures as f64,
            })
            .collect();
        by_pattern.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));

        FailureReport {
            total_failures,
            unclassified,
            by_pattern,
            window_start: self.templates.front().map(|t| t.created_at),
            window_end: self.templates.back().map(|t| t.created_at),
        }
    }
}

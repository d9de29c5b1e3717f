use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error value returned by collaborators (collectors and processors).
///
/// `status_code` carries a numeric HTTP-like status when the collaborator has one;
/// the failure analyzer turns it into an `HTTP_<code>` tag.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
    pub status_code: Option<u16>,
    /// Machine-readable code such as `ECONNRESET`
    pub code: Option<String>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            code: None,
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Message and code joined, the text pattern matching runs against
    pub fn describe(&self) -> String {
        match &self.code {
            Some(code) if !self.message.contains(code.as_str()) => {
                format!("{} ({code})", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

impl From<anyhow::Error> for StageError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}"))
    }
}

impl From<String> for StageError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StageError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure of one execution attempt; every variant is retryable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The collect stage failed
    #[error("Collection from {platform} failed: {error}")]
    CollectionError { platform: String, error: StageError },

    /// Every collected item failed processing
    #[error("All {failed_items} items failed processing: {last_error}")]
    ProcessingError {
        failed_items: usize,
        last_error: StageError,
    },

    /// The unit panicked or exceeded its execution timeout
    #[error("Execution fault: {reason}")]
    ExecutionFault { reason: String },
}

impl ExecutionError {
    pub fn fault(reason: impl Into<String>) -> Self {
        Self::ExecutionFault {
            reason: reason.into(),
        }
    }

    /// Collaborator error behind this failure, if any
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::CollectionError { error, .. } => Some(error),
            Self::ProcessingError { last_error, .. } => Some(last_error),
            Self::ExecutionFault { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.stage_error().and_then(|e| e.status_code)
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::CollectionError { .. } => "CollectionError",
            Self::ProcessingError { .. } => "ProcessingError",
            Self::ExecutionFault { .. } => "ExecutionFault",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_conversions() {
        let from_str: StageError = "socket hang up".into();
        assert_eq!(from_str.message, "socket hang up");
        assert!(from_str.status_code.is_none());

        let from_anyhow: StageError = anyhow::anyhow!("quota exceeded").into();
        assert_eq!(from_anyhow.to_string(), "quota exceeded");
    }

    #[test]
    fn test_describe_appends_code_once() {
        let error = StageError::new("connect failed").with_code("ECONNREFUSED");
        assert_eq!(error.describe(), "connect failed (ECONNREFUSED)");

        let error = StageError::new("ECONNREFUSED 127.0.0.1:443").with_code("ECONNREFUSED");
        assert_eq!(error.describe(), "ECONNREFUSED 127.0.0.1:443");
    }

    #[test]
    fn test_execution_error_exposes_stage_error() {
        let error = ExecutionError::CollectionError {
            platform: "youtube".into(),
            error: StageError::new("Too Many Requests").with_status_code(429),
        };
        assert_eq!(error.status_code(), Some(429));
        assert_eq!(error.error_type(), "CollectionError");
        assert_eq!(
            error.to_string(),
            "Collection from youtube failed: Too Many Requests"
        );

        let fault = ExecutionError::fault("timed out after 10ms");
        assert!(fault.stage_error().is_none());
        assert_eq!(fault.to_string(), "Execution fault: timed out after 10ms");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Admitted to the queue, waiting for a free slot
    Queued,
    /// An execution unit is working on the pipeline
    Running,
    /// Last attempt failed; waiting for the retry delay to elapse
    Retrying,
    /// Collected and processed successfully
    Completed,
    /// Retry budget exhausted
    Failed,
    /// Stopped by a caller or by shutdown
    Stopped,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 6] = [
        Self::Queued,
        Self::Running,
        Self::Retrying,
        Self::Completed,
        Self::Failed,
        Self::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Check if an execution unit is currently attached
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if the pipeline is waiting for a slot or a retry
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::Retrying)
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid pipeline status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(PipelineStatus::Completed.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(PipelineStatus::Stopped.is_terminal());
        assert!(!PipelineStatus::Queued.is_terminal());
        assert!(!PipelineStatus::Running.is_terminal());
        assert!(!PipelineStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_status_string_conversion() {
        for status in PipelineStatus::ALL {
            assert_eq!(status.to_string().parse::<PipelineStatus>().unwrap(), status);
        }
        assert!("in_progress".parse::<PipelineStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&PipelineStatus::Retrying).unwrap();
        assert_eq!(json, "\"retrying\"");
    }
}

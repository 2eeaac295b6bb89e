//! Error handling module for Cutlist

use thiserror::Error;

/// Main error type for render pipeline and project operations
#[derive(Error, Debug)]
pub enum CutlistError {
    /// Media metadata or keyframe query failed
    #[error("Probe failed: {message}")]
    Probe { message: String },

    /// A re-encode, copy or render job failed
    #[error("Encode failed during {stage}: {message}")]
    Encode { stage: String, message: String },

    /// Joining clips failed
    #[error("Concatenation failed: {message}")]
    Concat { message: String },

    /// Invalid input to a planner, e.g. an empty time range
    #[error("Invalid plan: {message}")]
    Planning { message: String },

    /// The export was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Project file could not be read or written
    #[error("Project file error: {message}")]
    Project { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CutlistError {
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }

    pub fn encode(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn concat(message: impl Into<String>) -> Self {
        Self::Concat {
            message: message.into(),
        }
    }

    pub fn planning(message: impl Into<String>) -> Self {
        Self::Planning {
            message: message.into(),
        }
    }

    /// Name of the pipeline stage the error originated from
    pub fn stage(&self) -> &str {
        match self {
            CutlistError::Probe { .. } => "probe",
            CutlistError::Encode { stage, .. } => stage,
            CutlistError::Concat { .. } => "concat",
            CutlistError::Planning { .. } => "planning",
            CutlistError::Cancelled => "cancelled",
            CutlistError::Config { .. } => "config",
            CutlistError::Project { .. } => "project",
            CutlistError::Io(_) | CutlistError::Json(_) => "io",
        }
    }

    /// Whether a plan-level fallback may be attempted after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CutlistError::Cancelled | CutlistError::Planning { .. } | CutlistError::Config { .. }
        )
    }
}

/// Result type alias for Cutlist operations
pub type CutlistResult<T> = std::result::Result<T, CutlistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(CutlistError::encode("head", "boom").stage(), "head");
        assert_eq!(CutlistError::concat("x").stage(), "concat");
        assert_eq!(CutlistError::planning("x").stage(), "planning");
    }

    #[test]
    fn test_recoverability() {
        assert!(CutlistError::encode("body", "exit 1").is_recoverable());
        assert!(CutlistError::concat("x").is_recoverable());
        assert!(!CutlistError::Cancelled.is_recoverable());
        assert!(!CutlistError::planning("start >= end").is_recoverable());
    }
}

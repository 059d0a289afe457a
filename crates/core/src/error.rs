//! Core Error Types
//!
//! Defines the foundational error types used across the CovSBOM workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The main application crate maps these onto its session error taxonomy
//! (InvalidInput, LaunchError, AnalysisFailure, ...).

use thiserror::Error;

/// Core error type for the CovSBOM workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed report document
    #[error("Parse error: {0}")]
    Parse(String),

    /// Call-graph nesting deeper than the configured ceiling
    #[error("Nesting depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a depth exceeded error
    pub fn depth_exceeded(depth: usize, limit: usize) -> Self {
        Self::DepthExceeded { depth, limit }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.
//!
//! The first six variants are the session error taxonomy: every one of them
//! is surfaced to the user, none is retried automatically.

use covsbom_core::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request (no path, not a directory, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The analyzer process could not be started
    #[error("Launch error: {0}")]
    Launch(String),

    /// The analyzer ran but did not complete successfully
    #[error("Analysis failed: {message}")]
    AnalysisFailure {
        message: String,
        /// Trailing log lines captured when the failure was detected
        log_tail: Vec<String>,
    },

    /// The report document is malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Call-graph nesting beyond the configured ceiling
    #[error("Nesting depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    /// An analysis is already running for the live session
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Serializable classification of an [`AppError`], recorded on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    LaunchError,
    AnalysisFailure,
    ParseError,
    DepthExceeded,
    SessionBusy,
    Config,
    Io,
    NotFound,
    Internal,
}

impl AppError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create an analysis failure carrying the trailing log lines
    pub fn analysis_failure(msg: impl Into<String>, log_tail: Vec<String>) -> Self {
        Self::AnalysisFailure {
            message: msg.into(),
            log_tail,
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a session busy error
    pub fn session_busy(msg: impl Into<String>) -> Self {
        Self::SessionBusy(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Launch(_) => ErrorKind::LaunchError,
            Self::AnalysisFailure { .. } => ErrorKind::AnalysisFailure,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::SessionBusy(_) => ErrorKind::SessionBusy,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Trailing log lines attached to the error, if any
    pub fn log_tail(&self) -> &[String] {
        match self {
            Self::AnalysisFailure { log_tail, .. } => log_tail,
            _ => &[],
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Parse(msg) => Self::Parse(msg),
            CoreError::DepthExceeded { depth, limit } => Self::DepthExceeded { depth, limit },
            CoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// Convert AppError to a string suitable for command responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

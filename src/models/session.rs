//! Analysis Session Models
//!
//! The single live analysis session and the events published while it runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, ErrorKind};

/// Stage of the live session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStage {
    /// No analysis started; a root path may be chosen
    #[default]
    Select,
    /// Analyzer running
    Analyze,
    /// Report available
    Results,
    /// Terminal failure; only a reset leaves this stage
    Error,
}

impl SessionStage {
    /// RESULTS and ERROR can only be left through a reset
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionStage::Results | SessionStage::Error)
    }
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStage::Select => write!(f, "SELECT"),
            SessionStage::Analyze => write!(f, "ANALYZE"),
            SessionStage::Results => write!(f, "RESULTS"),
            SessionStage::Error => write!(f, "ERROR"),
        }
    }
}

/// Which analyzer pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// The live analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    /// Unique session identifier
    pub id: String,
    /// Project root chosen by the user
    pub root_path: Option<PathBuf>,
    /// Current stage
    pub stage: SessionStage,
    /// Analyzer output, append-only, in arrival order
    pub log: Vec<String>,
    /// Analyzer exit code once it has exited
    pub exit_code: Option<i32>,
    /// Human-readable failure description when stage is Error
    pub error_message: Option<String>,
    /// Failure classification when stage is Error
    pub error_kind: Option<ErrorKind>,
    /// Trailing log lines captured with the failure
    pub error_log_tail: Vec<String>,
    /// Session creation timestamp (ISO 8601)
    pub created_at: String,
}

impl AnalysisSession {
    /// Create a fresh session in SELECT
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            root_path: None,
            stage: SessionStage::Select,
            log: Vec::new(),
            exit_code: None,
            error_message: None,
            error_kind: None,
            error_log_tail: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a fresh session for a chosen root path
    pub fn with_root_path(root_path: impl Into<PathBuf>) -> Self {
        let mut session = Self::new();
        session.root_path = Some(root_path.into());
        session
    }

    pub fn append_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn mark_analyzing(&mut self) {
        self.stage = SessionStage::Analyze;
    }

    pub fn mark_results(&mut self) {
        self.stage = SessionStage::Results;
    }

    /// Move to ERROR, recording the failure
    pub fn mark_error(&mut self, error: &AppError) {
        self.stage = SessionStage::Error;
        self.error_message = Some(error.to_string());
        self.error_kind = Some(error.kind());
        self.error_log_tail = error.log_tail().to_vec();
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification published for every session mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdateEvent {
    /// A fresh session replaced the previous one
    Created { session_id: String },
    /// An analyzer line was appended to the log
    LogAppended {
        session_id: String,
        stream: OutputStream,
        line: String,
    },
    /// The session moved between stages
    StageChanged {
        session_id: String,
        from: SessionStage,
        to: SessionStage,
    },
    /// The report was parsed and the dependency list is available
    ReportLoaded {
        session_id: String,
        dependency_count: usize,
    },
}

impl SessionUpdateEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Created { session_id }
            | Self::LogAppended { session_id, .. }
            | Self::StageChanged { session_id, .. }
            | Self::ReportLoaded { session_id, .. } => session_id,
        }
    }
}

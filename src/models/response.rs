//! Response Types
//!
//! Standard response types for the command layer.

use serde::{Deserialize, Serialize};

use covsbom_core::{DependencyTree, TreeMetrics, TreeNode};

/// Generic command response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> CommandResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response with message
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, crate::utils::error::AppError>> for CommandResponse<T> {
    fn from(result: Result<T, crate::utils::error::AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// One row of the dependency list shown in RESULTS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySummary {
    pub key: String,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    /// Top-level call sites recorded for the dependency
    pub call_count: usize,
}

/// Tree view for one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTreeResponse {
    pub key: String,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub root: TreeNode,
    pub metrics: TreeMetrics,
}

impl DependencyTreeResponse {
    pub fn new(summary: DependencySummary, tree: DependencyTree) -> Self {
        Self {
            key: summary.key,
            group_id: summary.group_id,
            artifact_id: summary.artifact_id,
            root: tree.root,
            metrics: tree.metrics,
        }
    }
}

/// Incremental log read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChunk {
    /// Lines from `offset` onwards
    pub lines: Vec<String>,
    /// Offset to pass on the next read
    pub next_offset: usize,
}

//! Analysis Commands
//!
//! Entry points a frontend calls to drive the analysis session. Each returns
//! a [`CommandResponse`] so failures reach the caller as data.

use std::path::PathBuf;
use std::sync::Arc;

use crate::models::response::{CommandResponse, DependencySummary, DependencyTreeResponse, LogChunk};
use crate::models::session::AnalysisSession;
use crate::models::settings::AppConfig;
use crate::services::analysis::AnalysisSessionManager;
use crate::services::dialog::DirectoryPicker;
use crate::utils::error::AppResult;

/// State shared by the analysis commands
#[derive(Clone)]
pub struct AnalysisState {
    manager: Arc<AnalysisSessionManager>,
}

impl AnalysisState {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Ok(Self {
            manager: Arc::new(AnalysisSessionManager::new(config)?),
        })
    }

    pub fn manager(&self) -> &Arc<AnalysisSessionManager> {
        &self.manager
    }
}

/// Choose the project root directory
pub async fn select_root_path(state: &AnalysisState, path: PathBuf) -> CommandResponse<AnalysisSession> {
    state.manager.select_root_path(path).into()
}

/// Ask the user for the project root; `data` is `None` when cancelled
pub async fn pick_root_path(
    state: &AnalysisState,
    picker: &dyn DirectoryPicker,
) -> CommandResponse<Option<AnalysisSession>> {
    state.manager.pick_root_path(picker).into()
}

/// Launch the analyzer for the selected root
pub async fn start_analysis(state: &AnalysisState) -> CommandResponse<AnalysisSession> {
    state.manager.start_analysis().into()
}

/// Current session snapshot
pub async fn get_session(state: &AnalysisState) -> CommandResponse<AnalysisSession> {
    state.manager.snapshot().into()
}

/// Log lines from `offset` onwards
pub async fn get_session_log(state: &AnalysisState, offset: usize) -> CommandResponse<LogChunk> {
    state.manager.log_since(offset).into()
}

/// Discard the session and return to project selection
pub async fn reset_session(state: &AnalysisState) -> CommandResponse<AnalysisSession> {
    state.manager.reset().await.into()
}

/// Dependencies found by the analysis
pub async fn list_dependencies(state: &AnalysisState) -> CommandResponse<Vec<DependencySummary>> {
    state.manager.list_dependencies().into()
}

/// Call tree for one dependency
pub async fn get_dependency_tree(
    state: &AnalysisState,
    key: String,
) -> CommandResponse<DependencyTreeResponse> {
    state.manager.dependency_tree(&key).into()
}

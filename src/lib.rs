//! CovSBOM Desktop - Rust Backend Library
//!
//! Orchestrates a CovSBOM analysis session. It includes:
//! - The analyzer job launcher and log monitor
//! - The session stage machine (SELECT, ANALYZE, RESULTS, ERROR)
//! - Report loading and call-tree building (via `covsbom-core`)
//! - Command handlers for a frontend, plus config and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use commands::analysis::{
    get_dependency_tree, get_session, get_session_log, list_dependencies, pick_root_path,
    reset_session, select_root_path, start_analysis, AnalysisState,
};
pub use models::response::*;
pub use models::session::{AnalysisSession, OutputStream, SessionStage, SessionUpdateEvent};
pub use models::settings::{AppConfig, SettingsUpdate};
pub use services::analysis::AnalysisSessionManager;
pub use utils::error::{AppError, AppResult, ErrorKind};

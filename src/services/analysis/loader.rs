//! Result Loader
//!
//! Locates and parses the analyzer's package-based report once the session
//! has reached RESULTS.

use std::path::{Path, PathBuf};

use covsbom_core::{parse_report, DependencyReport};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::models::settings::{AppConfig, ReportLocation};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{absolutize, project_folder_name};

/// Stack reserved for the parser thread before any nesting is accounted for
const PARSER_BASE_STACK: usize = 8 * 1024 * 1024;
/// Extra stack per permitted call layer
const PARSER_STACK_PER_LAYER: usize = 32 * 1024;

/// Reads reports produced by the analyzer
#[derive(Debug, Clone)]
pub struct ResultLoader {
    working_dir: Option<PathBuf>,
    location: ReportLocation,
    max_depth: usize,
}

impl ResultLoader {
    pub fn new(working_dir: Option<PathBuf>, location: ReportLocation, max_depth: usize) -> Self {
        Self {
            working_dir,
            location,
            max_depth,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.analyzer.working_dir.clone(),
            config.report.clone(),
            config.max_nesting_depth,
        )
    }

    /// Where the analyzer writes the report for `root_path`
    ///
    /// `<workingDir>/<outputDir>/<last component of root>/<fileName>`, where
    /// the working directory defaults to the current one.
    pub fn report_path(&self, root_path: &Path) -> AppResult<PathBuf> {
        let base = match self.working_dir {
            Some(ref dir) => absolutize(dir)?,
            None => std::env::current_dir()?,
        };
        Ok(base
            .join(&self.location.output_dir)
            .join(project_folder_name(root_path)?)
            .join(&self.location.file_name))
    }

    /// Read and parse the report at `path`
    pub async fn load_from_path(&self, path: &Path) -> AppResult<DependencyReport> {
        debug!(path = %path.display(), "Reading report");
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::parse(format!("Cannot read report {}: {}", path.display(), e))
        })?;
        let report = self.parse(text).await?;
        info!(
            path = %path.display(),
            dependencies = report.len(),
            "Loaded report"
        );
        Ok(report)
    }

    /// Parse report text on a dedicated thread sized for the nesting limit
    pub async fn parse(&self, text: String) -> AppResult<DependencyReport> {
        let max_depth = self.max_depth;
        let stack_size =
            PARSER_BASE_STACK.saturating_add(max_depth.saturating_mul(PARSER_STACK_PER_LAYER));
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("covsbom-report-parser".to_string())
            .stack_size(stack_size)
            .spawn(move || {
                let _ = tx.send(parse_report(&text, max_depth));
            })
            .map_err(|e| AppError::internal(format!("Failed to start report parser: {}", e)))?;

        let result = rx
            .await
            .map_err(|_| AppError::internal("Report parser stopped unexpectedly"))?;
        result.map_err(AppError::from)
    }
}

impl Default for ResultLoader {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

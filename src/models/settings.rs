//! Settings Models
//!
//! Application configuration and settings data structures.

use std::path::PathBuf;
use std::time::Duration;

use covsbom_core::DEFAULT_MAX_NESTING_DEPTH;
use serde::{Deserialize, Serialize};

/// Phrase the analyzer prints once it has written its reports
pub const DEFAULT_SENTINEL: &str = "End of analysis";

/// How the external analyzer is invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before `--process-directory <rootPath>`
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; reports are written relative to it
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: vec![
                "-jar".to_string(),
                "./ast_generator-1.0-SNAPSHOT.jar".to_string(),
            ],
            working_dir: None,
        }
    }
}

/// Where the analyzer leaves its package-based report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocation {
    /// Output directory, relative to the analyzer's working directory
    pub output_dir: PathBuf,
    /// Report file name inside `<outputDir>/<project folder>/`
    pub file_name: String,
}

impl Default for ReportLocation {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("CovSBOM_output").join("analysis"),
            file_name: "final_report_package_based.json".to_string(),
        }
    }
}

/// Application configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Log substring that marks a finished analysis
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Delay between the first sentinel and the RESULTS transition
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Nesting ceiling for report parsing and tree building
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
    /// Trailing log lines attached to analysis failures
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    /// Capacity of the analyzer output channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub report: ReportLocation,
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn default_grace_period_ms() -> u64 {
    2000
}

fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_NESTING_DEPTH
}

fn default_log_tail_lines() -> usize {
    20
}

fn default_event_buffer() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            sentinel: default_sentinel(),
            grace_period_ms: default_grace_period_ms(),
            max_nesting_depth: default_max_nesting_depth(),
            log_tail_lines: default_log_tail_lines(),
            event_buffer: default_event_buffer(),
            report: ReportLocation::default(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub analyzer_program: Option<String>,
    pub analyzer_args: Option<Vec<String>>,
    pub analyzer_working_dir: Option<PathBuf>,
    pub sentinel: Option<String>,
    pub grace_period_ms: Option<u64>,
    pub max_nesting_depth: Option<usize>,
    pub log_tail_lines: Option<usize>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(program) = update.analyzer_program {
            self.analyzer.program = program;
        }
        if let Some(args) = update.analyzer_args {
            self.analyzer.args = args;
        }
        if let Some(dir) = update.analyzer_working_dir {
            self.analyzer.working_dir = Some(dir);
        }
        if let Some(sentinel) = update.sentinel {
            self.sentinel = sentinel;
        }
        if let Some(ms) = update.grace_period_ms {
            self.grace_period_ms = ms;
        }
        if let Some(depth) = update.max_nesting_depth {
            self.max_nesting_depth = depth;
        }
        if let Some(lines) = update.log_tail_lines {
            self.log_tail_lines = lines;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.analyzer.program.trim().is_empty() {
            return Err("analyzer.program must not be empty".to_string());
        }
        if self.sentinel.is_empty() {
            return Err("sentinel must not be empty".to_string());
        }
        if self.max_nesting_depth == 0 {
            return Err("maxNestingDepth must be at least 1".to_string());
        }
        if self.log_tail_lines == 0 {
            return Err("logTailLines must be at least 1".to_string());
        }
        if self.event_buffer == 0 {
            return Err("eventBuffer must be at least 1".to_string());
        }
        if self.report.file_name.trim().is_empty() {
            return Err("report.fileName must not be empty".to_string());
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

//! Analysis Services
//!
//! Launching the analyzer, watching its output, driving the session stages
//! and loading the resulting report.

pub mod launcher;
pub mod loader;
pub mod monitor;
pub mod session_manager;

pub use launcher::{AnalyzerLauncher, JobEvent, JobHandle, LaunchConfig};
pub use loader::ResultLoader;
pub use monitor::{CompletionDetector, LineVerdict, LogMonitor, MonitorOutcome, MonitorSink};
pub use session_manager::AnalysisSessionManager;

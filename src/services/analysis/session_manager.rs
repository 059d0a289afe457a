//! Analysis Session Manager
//!
//! Owns the single live analysis session and enforces its stage machine:
//!
//! ```text
//! SELECT --start--> ANALYZE --sentinel + grace--> RESULTS
//!                      |                             |
//!                      +--failure--> ERROR <--bad report
//! any stage --reset--> SELECT (fresh session)
//! ```
//!
//! Every mutation is published as a [`SessionUpdateEvent`]. Background work
//! is tagged with the session id it was started for, so output or outcomes
//! from a session that has since been reset are dropped.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use covsbom_core::{DependencyReport, TreeBuilder};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::launcher::{AnalyzerLauncher, JobHandle, LaunchConfig};
use super::loader::ResultLoader;
use super::monitor::{CompletionDetector, LogMonitor, MonitorOutcome, MonitorSink};
use crate::models::response::{DependencySummary, DependencyTreeResponse, LogChunk};
use crate::models::session::{AnalysisSession, OutputStream, SessionStage, SessionUpdateEvent};
use crate::models::settings::AppConfig;
use crate::services::dialog::DirectoryPicker;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::absolutize;

/// Stage changes the machine allows, besides reset
fn transition_allowed(from: SessionStage, to: SessionStage) -> bool {
    use SessionStage::*;
    matches!(
        (from, to),
        (Select, Analyze) | (Analyze, Results) | (Analyze, Error) | (Results, Error)
    )
}

struct ActiveJob {
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

struct SessionSlot {
    session: AnalysisSession,
    report: Option<Arc<DependencyReport>>,
    job: Option<ActiveJob>,
}

impl SessionSlot {
    fn fresh() -> Self {
        Self {
            session: AnalysisSession::new(),
            report: None,
            job: None,
        }
    }
}

struct SessionCore {
    slot: Mutex<SessionSlot>,
    updates: broadcast::Sender<SessionUpdateEvent>,
}

impl SessionCore {
    fn lock(&self) -> AppResult<MutexGuard<'_, SessionSlot>> {
        self.slot
            .lock()
            .map_err(|_| AppError::internal("Session state lock poisoned"))
    }

    fn publish(&self, event: SessionUpdateEvent) {
        // no subscribers is fine
        let _ = self.updates.send(event);
    }

    /// Move the session to `to`, publishing the change
    fn transition(&self, slot: &mut SessionSlot, to: SessionStage) -> AppResult<()> {
        let from = slot.session.stage;
        if !transition_allowed(from, to) {
            return Err(AppError::internal(format!(
                "Illegal stage change {} -> {}",
                from, to
            )));
        }
        match to {
            SessionStage::Analyze => slot.session.mark_analyzing(),
            SessionStage::Results => slot.session.mark_results(),
            _ => slot.session.stage = to,
        }
        info!(session_id = %slot.session.id, %from, %to, "Session stage changed");
        self.publish(SessionUpdateEvent::StageChanged {
            session_id: slot.session.id.clone(),
            from,
            to,
        });
        Ok(())
    }

    fn fail(&self, slot: &mut SessionSlot, error: &AppError) -> AppResult<()> {
        self.transition(slot, SessionStage::Error)?;
        slot.session.mark_error(error);
        Ok(())
    }

    /// Run `f` against the slot if `session_id` is still the live session
    fn with_current<F>(&self, session_id: &str, f: F)
    where
        F: FnOnce(&SessionCore, &mut SessionSlot) -> AppResult<()>,
    {
        let mut slot = match self.lock() {
            Ok(slot) => slot,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        if slot.session.id != session_id {
            debug!(session_id, "Dropping update for a replaced session");
            return;
        }
        if let Err(e) = f(self, &mut slot) {
            warn!(session_id, "Failed to update session: {}", e);
        }
    }

    /// Load the report for a session that has reached RESULTS
    async fn load_report(&self, session_id: &str, loader: &ResultLoader, path: &Path) {
        let result = loader.load_from_path(path).await;
        self.with_current(session_id, |core, slot| {
            if slot.session.stage != SessionStage::Results {
                return Ok(());
            }
            match result {
                Ok(report) => {
                    let dependency_count = report.len();
                    slot.report = Some(Arc::new(report));
                    core.publish(SessionUpdateEvent::ReportLoaded {
                        session_id: slot.session.id.clone(),
                        dependency_count,
                    });
                    Ok(())
                }
                Err(error) => {
                    warn!(path = %path.display(), "Failed to load report: {}", error);
                    core.fail(slot, &error)
                }
            }
        });
    }
}

/// Feeds monitor observations into one specific session
struct SessionSink {
    core: Arc<SessionCore>,
    session_id: String,
}

impl MonitorSink for SessionSink {
    fn append_line(&self, stream: OutputStream, line: &str) {
        self.core.with_current(&self.session_id, |core, slot| {
            slot.session.append_log(line);
            core.publish(SessionUpdateEvent::LogAppended {
                session_id: slot.session.id.clone(),
                stream,
                line: line.to_string(),
            });
            Ok(())
        });
    }

    fn record_exit(&self, code: i32) {
        self.core.with_current(&self.session_id, |_, slot| {
            slot.session.set_exit_code(code);
            Ok(())
        });
    }

    fn complete(&self) {
        self.core.with_current(&self.session_id, |core, slot| {
            if slot.session.stage == SessionStage::Analyze {
                core.transition(slot, SessionStage::Results)?;
            }
            Ok(())
        });
    }

    fn fail(&self, error: AppError) {
        self.core.with_current(&self.session_id, |core, slot| {
            if slot.session.stage == SessionStage::Analyze {
                core.fail(slot, &error)?;
            }
            Ok(())
        });
    }
}

/// Background task owning one analyzer job from spawn to exit
async fn drive(
    core: Arc<SessionCore>,
    session_id: String,
    mut job: JobHandle,
    mut monitor: LogMonitor<SessionSink>,
    loader: ResultLoader,
    report_path: std::path::PathBuf,
    cancel: CancellationToken,
) {
    let outcome = monitor.watch(&mut job, &cancel).await;
    debug!(session_id = %session_id, ?outcome, "Monitor finished");
    if outcome == MonitorOutcome::Completed {
        tokio::join!(
            core.load_report(&session_id, &loader, &report_path),
            monitor.drain(&mut job, &cancel)
        );
    }
    job.terminate().await;
}

/// Manages the live analysis session
pub struct AnalysisSessionManager {
    core: Arc<SessionCore>,
    config: AppConfig,
    launcher: AnalyzerLauncher,
    loader: ResultLoader,
}

impl AnalysisSessionManager {
    /// Create a manager holding a fresh session in SELECT
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;
        let (updates, _) = broadcast::channel(config.event_buffer.max(1));
        Ok(Self {
            core: Arc::new(SessionCore {
                slot: Mutex::new(SessionSlot::fresh()),
                updates,
            }),
            launcher: AnalyzerLauncher::new(LaunchConfig::from_config(&config)),
            loader: ResultLoader::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Receive every future session update
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdateEvent> {
        self.core.updates.subscribe()
    }

    /// Copy of the live session
    pub fn snapshot(&self) -> AppResult<AnalysisSession> {
        Ok(self.core.lock()?.session.clone())
    }

    pub fn stage(&self) -> AppResult<SessionStage> {
        Ok(self.core.lock()?.session.stage)
    }

    /// Log lines from `offset` onwards
    pub fn log_since(&self, offset: usize) -> AppResult<LogChunk> {
        let slot = self.core.lock()?;
        let log = &slot.session.log;
        let start = offset.min(log.len());
        Ok(LogChunk {
            lines: log[start..].to_vec(),
            next_offset: log.len(),
        })
    }

    /// Choose the project root; only allowed in SELECT
    ///
    /// Replaces the session with a fresh one bound to the path.
    pub fn select_root_path(&self, path: impl AsRef<Path>) -> AppResult<AnalysisSession> {
        let path = path.as_ref();
        let mut slot = self.core.lock()?;
        match slot.session.stage {
            SessionStage::Select => {}
            SessionStage::Analyze => {
                return Err(AppError::session_busy("An analysis is already running"))
            }
            stage => {
                return Err(AppError::invalid_input(format!(
                    "Cannot choose a project in {}; reset the session first",
                    stage
                )))
            }
        }
        if path.as_os_str().is_empty() {
            return Err(AppError::invalid_input("No project directory selected"));
        }

        let root = absolutize(path)?;
        slot.session = AnalysisSession::with_root_path(root);
        slot.report = None;
        info!(
            session_id = %slot.session.id,
            root = %path.display(),
            "Project selected"
        );
        self.core.publish(SessionUpdateEvent::Created {
            session_id: slot.session.id.clone(),
        });
        Ok(slot.session.clone())
    }

    /// Ask a picker for the project root; `None` when the user cancelled
    pub fn pick_root_path(&self, picker: &dyn DirectoryPicker) -> AppResult<Option<AnalysisSession>> {
        match picker.pick_directory()? {
            Some(path) => self.select_root_path(path).map(Some),
            None => {
                debug!("Directory selection cancelled");
                Ok(None)
            }
        }
    }

    /// Launch the analyzer for the selected root: SELECT -> ANALYZE
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_analysis(&self) -> AppResult<AnalysisSession> {
        let mut slot = self.core.lock()?;
        match slot.session.stage {
            SessionStage::Select => {}
            SessionStage::Analyze => {
                return Err(AppError::session_busy("An analysis is already running"))
            }
            stage => {
                return Err(AppError::invalid_input(format!(
                    "Cannot start an analysis in {}; reset the session first",
                    stage
                )))
            }
        }
        let root = slot
            .session
            .root_path
            .clone()
            .ok_or_else(|| AppError::invalid_input("No project directory selected"))?;
        AnalyzerLauncher::validate_root_path(&root)?;
        let report_path = self.loader.report_path(&root)?;

        self.core.transition(&mut slot, SessionStage::Analyze)?;
        let job = match self.launcher.start(&root) {
            Ok(job) => job,
            Err(error) => {
                warn!(root = %root.display(), "Failed to launch analyzer: {}", error);
                self.core.fail(&mut slot, &error)?;
                return Err(error);
            }
        };

        let session_id = slot.session.id.clone();
        let monitor = LogMonitor::new(
            CompletionDetector::new(self.config.sentinel.clone(), self.config.log_tail_lines),
            self.config.grace_period(),
            SessionSink {
                core: Arc::clone(&self.core),
                session_id: session_id.clone(),
            },
        );
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            Arc::clone(&self.core),
            session_id,
            job,
            monitor,
            self.loader.clone(),
            report_path,
            cancel.clone(),
        ));
        slot.job = Some(ActiveJob { cancel, driver });
        Ok(slot.session.clone())
    }

    /// Discard the session and start over in SELECT
    ///
    /// Any running analyzer is terminated before this returns.
    pub async fn reset(&self) -> AppResult<AnalysisSession> {
        let (session, job) = {
            let mut slot = self.core.lock()?;
            let previous = slot.session.id.clone();
            let job = slot.job.take();
            *slot = SessionSlot::fresh();
            info!(previous = %previous, session_id = %slot.session.id, "Session reset");
            self.core.publish(SessionUpdateEvent::Created {
                session_id: slot.session.id.clone(),
            });
            (slot.session.clone(), job)
        };
        if let Some(job) = job {
            stop_job(job).await;
        }
        Ok(session)
    }

    /// Terminate any running analyzer, leaving the session as it is
    pub async fn shutdown(&self) -> AppResult<()> {
        let job = self.core.lock()?.job.take();
        if let Some(job) = job {
            stop_job(job).await;
        }
        Ok(())
    }

    /// Wait until the current analysis has settled
    ///
    /// Returns once the report is loaded or the session is in ERROR.
    pub async fn wait_for_outcome(&self) -> AppResult<AnalysisSession> {
        let mut updates = self.subscribe();
        let session_id = {
            let slot = self.core.lock()?;
            if slot.session.stage == SessionStage::Select {
                return Err(AppError::invalid_input("No analysis has been started"));
            }
            if Self::settled(&slot) {
                return Ok(slot.session.clone());
            }
            slot.session.id.clone()
        };

        loop {
            match updates.recv().await {
                Ok(event) if event.session_id() != session_id => {
                    if matches!(event, SessionUpdateEvent::Created { .. }) {
                        return Err(AppError::invalid_input("Session was reset"));
                    }
                }
                Ok(SessionUpdateEvent::StageChanged { to: SessionStage::Error, .. })
                | Ok(SessionUpdateEvent::ReportLoaded { .. }) => return self.snapshot(),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Session update receiver lagged");
                    let slot = self.core.lock()?;
                    if slot.session.id != session_id {
                        return Err(AppError::invalid_input("Session was reset"));
                    }
                    if Self::settled(&slot) {
                        return Ok(slot.session.clone());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(AppError::internal("Session update channel closed"));
                }
            }
        }
    }

    /// RESULTS only counts once the report is loaded
    fn settled(slot: &SessionSlot) -> bool {
        let stage = slot.session.stage;
        stage.is_settled() && (stage == SessionStage::Error || slot.report.is_some())
    }

    /// The loaded report; only available in RESULTS
    pub fn report(&self) -> AppResult<Arc<DependencyReport>> {
        let slot = self.core.lock()?;
        if slot.session.stage != SessionStage::Results {
            return Err(AppError::invalid_input(format!(
                "No results available in {}",
                slot.session.stage
            )));
        }
        slot.report
            .clone()
            .ok_or_else(|| AppError::invalid_input("The report is still loading"))
    }

    /// Dependencies of the loaded report, in report order
    pub fn list_dependencies(&self) -> AppResult<Vec<DependencySummary>> {
        let report = self.report()?;
        Ok(report
            .iter()
            .map(|(key, entries)| summarize(key, entries.len()))
            .collect())
    }

    /// Build the call tree for one dependency
    ///
    /// A tree that cannot be built moves the session to ERROR.
    pub fn dependency_tree(&self, key: &str) -> AppResult<DependencyTreeResponse> {
        let report = self.report()?;
        let (dependency, entries) = report
            .iter()
            .find(|(candidate, _)| candidate.as_str() == key)
            .ok_or_else(|| AppError::not_found(format!("Dependency not found: {}", key)))?;

        match TreeBuilder::new(self.config.max_nesting_depth).build(entries) {
            Ok(tree) => Ok(DependencyTreeResponse::new(
                summarize(dependency, entries.len()),
                tree,
            )),
            Err(e) => {
                let error = AppError::from(e);
                let mut slot = self.core.lock()?;
                if slot.session.stage == SessionStage::Results {
                    self.core.fail(&mut slot, &error)?;
                }
                Err(error)
            }
        }
    }
}

impl Drop for AnalysisSessionManager {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.core.slot.lock() {
            if let Some(job) = slot.job.take() {
                job.cancel.cancel();
            }
        }
    }
}

fn summarize(key: &covsbom_core::DependencyKey, call_count: usize) -> DependencySummary {
    DependencySummary {
        key: key.to_string(),
        group_id: key.group_id().map(str::to_string),
        artifact_id: key.artifact_id().map(str::to_string),
        call_count,
    }
}

async fn stop_job(job: ActiveJob) {
    job.cancel.cancel();
    if let Err(e) = job.driver.await {
        warn!("Analysis task failed: {}", e);
    }
}

//! Analyzer Job Launcher
//!
//! Spawns the external analyzer for a project root and turns its output pipes
//! into an ordered stream of [`JobEvent`]s. Lines keep their order within a
//! pipe; stdout and stderr are not ordered relative to each other. The exit
//! event is sent only after both pipes have been drained.
//!
//! The child process is owned by a supervisor task for its whole life and is
//! killed when the job is cancelled or its handle dropped. On unix the
//! analyzer leads its own process group, and cancellation kills the whole
//! group so build tools it started go down with it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::session::OutputStream;
use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// Flag the analyzer expects in front of the project root
pub const PROCESS_DIRECTORY_FLAG: &str = "--process-directory";

/// Exit code reported when the analyzer was ended by a signal
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Output of a running analyzer job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// One line of output, without its line terminator
    Line { stream: OutputStream, text: String },
    /// The process exited; always the last event of a job
    Exited { code: i32 },
}

/// Configuration for spawning the analyzer
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before `--process-directory <root>`
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
    /// Capacity of the event channel
    pub buffer: usize,
}

impl LaunchConfig {
    /// Create a launch configuration for a program with no extra arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            buffer: 256,
        }
    }

    /// Build from the application configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            program: config.analyzer.program.clone(),
            args: config.analyzer.args.clone(),
            working_dir: config.analyzer.working_dir.clone(),
            buffer: config.event_buffer,
        }
    }

    /// Set the leading arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument list for a given root, program excluded
    pub fn command_args(&self, root_path: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(PROCESS_DIRECTORY_FLAG.to_string());
        args.push(root_path.to_string_lossy().into_owned());
        args
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Handle to a running analyzer job
///
/// Dropping the handle cancels the job and kills the process.
pub struct JobHandle {
    events: mpsc::Receiver<JobEvent>,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Next output or exit event; `None` once the job is finished
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Kill the process (if still running) and wait until it has been reaped
    pub async fn terminate(&mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.await {
                warn!("Analyzer supervisor task failed: {}", e);
            }
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts analyzer jobs
#[derive(Debug, Clone, Default)]
pub struct AnalyzerLauncher {
    config: LaunchConfig,
}

impl AnalyzerLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Check the launch precondition: a non-empty path to an existing directory
    pub fn validate_root_path(root_path: &Path) -> AppResult<()> {
        if root_path.as_os_str().is_empty() {
            return Err(AppError::invalid_input("No project directory selected"));
        }
        if !root_path.exists() {
            return Err(AppError::invalid_input(format!(
                "Project directory does not exist: {}",
                root_path.display()
            )));
        }
        if !root_path.is_dir() {
            return Err(AppError::invalid_input(format!(
                "Project path is not a directory: {}",
                root_path.display()
            )));
        }
        Ok(())
    }

    /// Spawn the analyzer for `root_path`
    ///
    /// Must be called from within a Tokio runtime. Fails with `InvalidInput`
    /// before spawning anything when the precondition does not hold, and with
    /// `Launch` when the process cannot be started.
    pub fn start(&self, root_path: &Path) -> AppResult<JobHandle> {
        Self::validate_root_path(root_path)?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.config.command_args(root_path));
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::launch(format!(
                "Analyzer executable not found: {}",
                self.config.program
            )),
            std::io::ErrorKind::PermissionDenied => AppError::launch(format!(
                "Permission denied running analyzer: {}",
                self.config.program
            )),
            _ => AppError::launch(format!("Failed to spawn analyzer: {}", e)),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::launch("Failed to capture analyzer stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::launch("Failed to capture analyzer stderr"))?;

        let pid = child.id();
        info!(
            pid = ?pid,
            program = %self.config.program,
            root = %root_path.display(),
            "Spawned analyzer"
        );

        let (tx, rx) = mpsc::channel(self.config.buffer.max(1));
        let cancel = CancellationToken::new();
        let readers = vec![
            tokio::spawn(pump_lines(stdout, OutputStream::Stdout, tx.clone())),
            tokio::spawn(pump_lines(stderr, OutputStream::Stderr, tx.clone())),
        ];
        let supervisor = tokio::spawn(supervise(child, pid, readers, tx, cancel.clone()));

        Ok(JobHandle {
            events: rx,
            cancel,
            supervisor: Some(supervisor),
        })
    }
}

/// Forward one pipe line by line; invalid UTF-8 is replaced, not fatal
async fn pump_lines<R>(pipe: R, stream: OutputStream, tx: mpsc::Sender<JobEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                if tx.send(JobEvent::Line { stream, text }).await.is_err() {
                    // receiver dropped, stop reading
                    break;
                }
            }
            Err(e) => {
                warn!(?stream, "Failed to read analyzer output: {}", e);
                break;
            }
        }
    }
    debug!(?stream, "Analyzer pipe closed");
}

/// Own the child until it exits or the job is cancelled
async fn supervise(
    mut child: Child,
    pid: Option<u32>,
    mut readers: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<JobEvent>,
    cancel: CancellationToken,
) {
    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };
    let Some(status) = status else {
        kill(&mut child, pid, &readers).await;
        return;
    };

    let drained = tokio::select! {
        _ = join_readers(&mut readers) => true,
        _ = cancel.cancelled() => false,
    };
    if !drained {
        // leftover group members may still hold the pipes open
        if let Some(pid) = pid {
            kill_process_group(pid);
        }
        for reader in &readers {
            reader.abort();
        }
        return;
    }

    let code = match status {
        Ok(status) => status.code().unwrap_or(SIGNAL_EXIT_CODE),
        Err(e) => {
            warn!("Failed to wait for analyzer: {}", e);
            SIGNAL_EXIT_CODE
        }
    };
    info!(code, "Analyzer exited");
    let _ = tx.send(JobEvent::Exited { code }).await;
}

async fn join_readers(readers: &mut [JoinHandle<()>]) {
    for reader in readers.iter_mut() {
        if let Err(e) = reader.await {
            warn!("Analyzer output reader failed: {}", e);
        }
    }
}

async fn kill(child: &mut Child, pid: Option<u32>, readers: &[JoinHandle<()>]) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to kill analyzer: {}", e);
    } else {
        info!("Analyzer terminated");
    }
    for reader in readers {
        reader.abort();
    }
}

/// SIGKILL every process in the group led by `pgid`
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, "Analyzer process group already gone: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {
    // No process groups; `Child::kill` handles the direct child only.
}

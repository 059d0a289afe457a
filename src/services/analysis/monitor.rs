//! Log Monitor
//!
//! Consumes a job's output, appends it to the session log and decides when
//! the analysis is complete. The first line containing the sentinel starts a
//! grace period; when it elapses the session moves to RESULTS. A non-zero
//! exit before that point, or any exit without a sentinel, is a failure.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::launcher::{JobEvent, JobHandle};
use crate::models::session::OutputStream;
use crate::utils::error::AppError;

/// Receives what the monitor observes
///
/// Implementations ignore calls that no longer apply, e.g. after a reset.
pub trait MonitorSink: Send + Sync {
    /// Append one analyzer line to the log
    fn append_line(&self, stream: OutputStream, line: &str);
    /// Record the analyzer's exit code
    fn record_exit(&self, code: i32);
    /// ANALYZE -> RESULTS
    fn complete(&self);
    /// ANALYZE -> ERROR
    fn fail(&self, error: AppError);
}

/// What a line meant to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    Logged,
    /// First occurrence of the sentinel
    SentinelSeen,
}

/// Tracks sentinel detection and the recent log tail
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    sentinel: String,
    sentinel_seen: bool,
    tail: VecDeque<String>,
    tail_capacity: usize,
}

impl CompletionDetector {
    pub fn new(sentinel: impl Into<String>, tail_capacity: usize) -> Self {
        Self {
            sentinel: sentinel.into(),
            sentinel_seen: false,
            tail: VecDeque::with_capacity(tail_capacity),
            tail_capacity,
        }
    }

    pub fn sentinel_seen(&self) -> bool {
        self.sentinel_seen
    }

    /// Record a line; only the first sentinel occurrence is reported
    pub fn observe_line(&mut self, line: &str) -> LineVerdict {
        if self.tail_capacity > 0 {
            if self.tail.len() == self.tail_capacity {
                self.tail.pop_front();
            }
            self.tail.push_back(line.to_string());
        }

        if !self.sentinel_seen && line.contains(&self.sentinel) {
            self.sentinel_seen = true;
            LineVerdict::SentinelSeen
        } else {
            LineVerdict::Logged
        }
    }

    /// Classify an exit that happened before RESULTS
    pub fn exit_failure(&self, code: i32) -> Option<AppError> {
        if code != 0 {
            Some(AppError::analysis_failure(
                format!("Analyzer exited with code {}", code),
                self.log_tail(),
            ))
        } else if !self.sentinel_seen {
            Some(AppError::analysis_failure(
                "Analyzer exited without reporting completion",
                self.log_tail(),
            ))
        } else {
            None
        }
    }

    /// Failure for output that ended without an exit status
    pub fn stream_closed(&self) -> AppError {
        AppError::analysis_failure("Analyzer output ended unexpectedly", self.log_tail())
    }

    pub fn log_tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }
}

/// How watching a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Grace period elapsed; the session is in RESULTS
    Completed,
    /// The session was moved to ERROR
    Failed,
    /// Cancelled from outside; the process has been terminated
    Cancelled,
}

/// Drives one session's ANALYZE stage
pub struct LogMonitor<S> {
    detector: CompletionDetector,
    grace_period: Duration,
    sink: S,
}

impl<S: MonitorSink> LogMonitor<S> {
    pub fn new(detector: CompletionDetector, grace_period: Duration, sink: S) -> Self {
        Self {
            detector,
            grace_period,
            sink,
        }
    }

    /// Watch the job until the session reaches RESULTS or ERROR
    ///
    /// On `Completed` the job may still be running; call [`Self::drain`] to
    /// collect whatever it prints afterwards.
    pub async fn watch(&mut self, job: &mut JobHandle, cancel: &CancellationToken) -> MonitorOutcome {
        let mut deadline: Option<Instant> = None;
        let mut stream_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    job.terminate().await;
                    return MonitorOutcome::Cancelled;
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    info!("Grace period elapsed, analysis complete");
                    self.sink.complete();
                    return MonitorOutcome::Completed;
                }
                event = job.next_event(), if stream_open => match event {
                    Some(JobEvent::Line { stream, text }) => {
                        self.sink.append_line(stream, &text);
                        if self.detector.observe_line(&text) == LineVerdict::SentinelSeen {
                            debug!(grace_ms = self.grace_period.as_millis() as u64, "Completion sentinel seen");
                            deadline = Some(Instant::now() + self.grace_period);
                        }
                    }
                    Some(JobEvent::Exited { code }) => {
                        self.sink.record_exit(code);
                        if let Some(error) = self.detector.exit_failure(code) {
                            warn!(code, "Analysis failed: {}", error);
                            self.sink.fail(error);
                            return MonitorOutcome::Failed;
                        }
                    }
                    None => {
                        stream_open = false;
                        if deadline.is_none() {
                            let error = self.detector.stream_closed();
                            warn!("Analysis failed: {}", error);
                            self.sink.fail(error);
                            job.terminate().await;
                            return MonitorOutcome::Failed;
                        }
                    }
                }
            }
        }
    }

    /// Keep logging output after RESULTS until the job ends
    ///
    /// Further sentinels are plain log lines and a non-zero exit is only
    /// logged.
    pub async fn drain(&mut self, job: &mut JobHandle, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    job.terminate().await;
                    return;
                }
                event = job.next_event() => match event {
                    Some(JobEvent::Line { stream, text }) => {
                        self.detector.observe_line(&text);
                        self.sink.append_line(stream, &text);
                    }
                    Some(JobEvent::Exited { code }) => {
                        self.sink.record_exit(code);
                        if code != 0 {
                            warn!(code, "Analyzer exited with a failure after reporting completion");
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

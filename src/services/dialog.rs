//! Directory Selection
//!
//! Seam for asking the user for a project directory. The desktop shell
//! supplies a native dialog; the CLI reads a path from stdin or its
//! arguments.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::utils::error::{AppError, AppResult};

/// Asks the user for a directory
pub trait DirectoryPicker: Send + Sync {
    /// `Ok(None)` when the user cancelled
    fn pick_directory(&self) -> AppResult<Option<PathBuf>>;
}

/// Always answers with the same path
#[derive(Debug, Clone, Default)]
pub struct FixedDirectoryPicker {
    path: Option<PathBuf>,
}

impl FixedDirectoryPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A picker the user always cancels
    pub fn cancelled() -> Self {
        Self { path: None }
    }
}

impl DirectoryPicker for FixedDirectoryPicker {
    fn pick_directory(&self) -> AppResult<Option<PathBuf>> {
        Ok(self.path.clone())
    }
}

/// Reads one line from a reader; an empty line or end of input cancels
pub struct StdinDirectoryPicker<R> {
    input: Mutex<R>,
    prompt: Option<String>,
}

impl<R: BufRead + Send> StdinDirectoryPicker<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
            prompt: None,
        }
    }

    /// Print `prompt` to stderr before reading
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

impl<R: BufRead + Send> DirectoryPicker for StdinDirectoryPicker<R> {
    fn pick_directory(&self) -> AppResult<Option<PathBuf>> {
        if let Some(ref prompt) = self.prompt {
            let mut stderr = std::io::stderr();
            write!(stderr, "{}", prompt)?;
            stderr.flush()?;
        }

        let mut input = self
            .input
            .lock()
            .map_err(|_| AppError::internal("Directory picker input lock poisoned"))?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PathBuf::from(trimmed)))
        }
    }
}

//! The external "resync models" collaborator.
//!
//! When a model fails to load the engine may ask a [`ModelSync`] to repopulate
//! the model directory (for example from a git mirror) before retrying once.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::SyncError;

pub trait ModelSync: Send + Sync {
    /// Repopulate the model directory. Blocks until done.
    ///
    /// Returns a human-readable message on success.
    fn resync(&self) -> Result<String, SyncError>;
}

/// A collaborator that never succeeds; used when no resync is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSync;

impl ModelSync for DisabledSync {
    fn resync(&self) -> Result<String, SyncError> {
        Err(SyncError("model resync is not configured".to_string()))
    }
}

/// Runs an external program to resync models.
///
/// Exit status 0 means success; otherwise the trimmed stderr is reported.
#[derive(Debug, Clone)]
pub struct CommandSync {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandSync {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ModelSync for CommandSync {
    fn resync(&self) -> Result<String, SyncError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError(format!("{} is not installed", self.program.display()))
            } else {
                SyncError(format!("could not run {}: {e}", self.program.display()))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(SyncError(if stderr.is_empty() {
                format!("{} exited with code {:?}", self.program.display(), output.status.code())
            } else {
                stderr.to_string()
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

//! Kernel launch command building.

use std::path::{Path, PathBuf};

use mathline_core::LinkConfig;
use thiserror::Error;

/// Link mode that starts a new kernel process.
pub const LAUNCH_MODE: &str = "launch";
/// Link mode that attaches to a listening kernel.
pub const CONNECT_MODE: &str = "connect";

/// Launch error.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Link name cannot be parsed: {0}")]
    InvalidCommand(String),
    #[error("Link name is empty after parsing")]
    EmptyCommand,
    #[error("Kernel executable not found: {0}")]
    NotFound(String),
    #[error("Link mode {0:?} is not supported by the process transport")]
    UnsupportedMode(String),
    #[error("Failed to start kernel: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Kernel program and arguments parsed from a link name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Parse a shell-style command line.
    ///
    /// # Errors
    /// Returns error if the quoting is unbalanced or nothing is left.
    pub fn parse(line: &str) -> Result<Self, LaunchError> {
        let mut parts =
            shlex::split(line).ok_or_else(|| LaunchError::InvalidCommand(line.to_string()))?;
        if parts.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    /// Build the command for a link configuration.
    ///
    /// # Errors
    /// Returns error if the mode is not `launch` or the name is invalid.
    pub fn from_config(config: &LinkConfig) -> Result<Self, LaunchError> {
        match config.mode.as_str() {
            LAUNCH_MODE => Self::parse(&config.name),
            CONNECT_MODE => {
                tracing::warn!(name = %config.name, "connect mode needs a listening kernel");
                Err(LaunchError::UnsupportedMode(config.mode.clone()))
            }
            other => Err(LaunchError::UnsupportedMode(other.to_string())),
        }
    }

    /// Resolve the program to an executable path.
    ///
    /// # Errors
    /// Returns error if executable not found.
    pub fn resolve(&self) -> Result<PathBuf, LaunchError> {
        resolve_executable_path(&self.program)
            .ok_or_else(|| LaunchError::NotFound(self.program.clone()))
    }
}

/// Resolve an executable by name.
///
/// Paths containing a separator are taken as given; bare names are looked
/// up on `PATH`.
#[must_use]
pub fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    which::which(executable).ok()
}

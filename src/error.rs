//! Typed errors for the run controller and the layers that feed it.
//!
//! Application edges (`main`, `cli::run`, the TUI thread) still use `anyhow` and
//! attach context; these enums exist where callers need to tell failures apart.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

/// The child process could not be created.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{program}: {reason}")]
    Spawn {
        program: String,
        reason: String,
        #[source]
        source: io::Error,
    },
    #[error("child {0} was not captured")]
    MissingPipe(&'static str),
}

impl LaunchError {
    pub fn spawn(program: &Path, source: io::Error) -> Self {
        let reason = match source.kind() {
            io::ErrorKind::NotFound => "executable not found".to_string(),
            io::ErrorKind::PermissionDenied => "permission denied (is it executable?)".to_string(),
            _ => source.to_string(),
        };
        LaunchError::Spawn {
            program: program.display().to_string(),
            reason,
            source,
        }
    }
}

/// A command was refused because of the controller's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlError {
    #[error("a copy is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cppp binary not found (tried: {})", .0.join(", "))]
    NotFound(Vec<String>),
}

/// Invalid values entered in the copy form or passed on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("source path must not be empty")]
    EmptyInput,
    #[error("destination path must not be empty")]
    EmptyOutput,
    #[error("thread count must be a whole number, got {0:?}")]
    InvalidParts(String),
    #[error("thread count must be at least 1")]
    PartsTooLow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_names_missing_executable() {
        let err = LaunchError::spawn(
            Path::new("./build/cppp"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(err.to_string(), "./build/cppp: executable not found");
    }

    #[test]
    fn spawn_error_explains_permission_denied() {
        let err = LaunchError::spawn(
            Path::new("/tmp/cppp"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn not_found_lists_every_candidate() {
        let err = ResolveError::NotFound(vec!["./build/cppp".into(), "./cppp".into()]);
        assert_eq!(
            err.to_string(),
            "cppp binary not found (tried: ./build/cppp, ./cppp)"
        );
    }
}

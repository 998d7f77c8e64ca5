/// Error types for textsweep.
///
/// Every failure a single file can hit maps onto one variant here, so the
/// orchestrator can record it against that file's outcome instead of aborting
/// the batch:
///
/// ```rust,ignore
/// match mutator.replace(path) {
///     Ok(report) => // replaced, report.substitutions tells how many,
///     Err(SweepError::NotText(path)) => // benign skip,
///     Err(SweepError::InvalidInput(msg)) => // missing/empty/directory,
///     Err(e) => // I/O failure, recorded as a failed outcome
/// }
/// ```
///
/// `NotText`, `InvalidInput` and `NotFound` are skips rather than failures;
/// [`SweepError::skip_reason`] is the single place that rule lives.
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::results::SkipReason;

/// Result type for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;

/// The file-system step that was running when an I/O error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    Open,
    Read,
    Write,
    CreateTemp,
    Delete,
    Rename,
    Permissions,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IoStage::Open => "open",
            IoStage::Read => "read",
            IoStage::Write => "write",
            IoStage::CreateTemp => "create temporary file",
            IoStage::Delete => "delete original",
            IoStage::Rename => "rename temporary file",
            IoStage::Permissions => "restore permissions",
        };
        f.write_str(name)
    }
}

/// A single file that could not be processed, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Errors that can occur while classifying, searching or rewriting files
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a text file: {0}")]
    NotText(PathBuf),
    #[error("IO error ({stage}) on {path}: {source}")]
    Io {
        path: PathBuf,
        stage: IoStage,
        #[source]
        source: std::io::Error,
    },
    #[error("Interrupted while processing {path}: {reason}")]
    Interrupted { path: PathBuf, reason: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("{} of {total} files failed: {}", failures.len(), join_failures(failures))]
    BatchFailed {
        total: usize,
        failures: Vec<FileFailure>,
    },
}

fn join_failures(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SweepError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn not_text(path: impl Into<PathBuf>) -> Self {
        Self::NotText(path.into())
    }

    pub fn io(path: impl Into<PathBuf>, stage: IoStage, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            stage,
            source,
        }
    }

    pub fn interrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Interrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Maps an `open` failure onto the taxonomy: a missing file is `NotFound`,
    /// everything else stays an I/O error.
    pub fn from_open(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(path),
            _ => Self::io(path, IoStage::Open, source),
        }
    }

    /// Why a file was skipped, or `None` when the error is a real failure
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            SweepError::NotText(_) => Some(SkipReason::NotText),
            SweepError::InvalidInput(_) | SweepError::NotFound(_) => Some(SkipReason::Invalid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let path = Path::new("test.txt");
        let err = SweepError::not_found(path);
        assert!(matches!(err, SweepError::NotFound(_)));

        let err = SweepError::not_text(path);
        assert!(matches!(err, SweepError::NotText(_)));

        let err = SweepError::invalid_input("empty pattern");
        assert!(matches!(err, SweepError::InvalidInput(_)));

        let err = SweepError::io(path, IoStage::Rename, io::Error::other("busy"));
        assert!(matches!(
            err,
            SweepError::Io {
                stage: IoStage::Rename,
                ..
            }
        ));
    }

    #[test]
    fn test_skip_reasons() {
        let path = Path::new("a.txt");
        assert_eq!(
            SweepError::not_text(path).skip_reason(),
            Some(SkipReason::NotText)
        );
        assert_eq!(
            SweepError::not_found(path).skip_reason(),
            Some(SkipReason::Invalid)
        );
        assert_eq!(
            SweepError::invalid_input("empty file").skip_reason(),
            Some(SkipReason::Invalid)
        );

        let err = SweepError::io(path, IoStage::Read, io::Error::other("eio"));
        assert_eq!(err.skip_reason(), None);
        assert_eq!(SweepError::interrupted(path, "panic").skip_reason(), None);
    }

    #[test]
    fn test_from_open_maps_not_found() {
        let path = Path::new("missing.txt");
        let err = SweepError::from_open(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SweepError::NotFound(_)));

        let err = SweepError::from_open(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            err,
            SweepError::Io {
                stage: IoStage::Open,
                ..
            }
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = SweepError::config_error("Missing required field");
        assert_eq!(err.to_string(), "Configuration error: Missing required field");

        let err = SweepError::not_found("test.txt");
        assert_eq!(err.to_string(), "File not found: test.txt");

        let err = SweepError::io("a.txt", IoStage::Delete, io::Error::other("locked"));
        assert_eq!(err.to_string(), "IO error (delete original) on a.txt: locked");

        let err = SweepError::BatchFailed {
            total: 3,
            failures: vec![
                FileFailure {
                    path: PathBuf::from("a.txt"),
                    reason: "locked".to_string(),
                },
                FileFailure {
                    path: PathBuf::from("b.txt"),
                    reason: "gone".to_string(),
                },
            ],
        };
        assert_eq!(err.to_string(), "2 of 3 files failed: a.txt: locked; b.txt: gone");
    }
}

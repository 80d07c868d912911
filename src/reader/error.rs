use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reading from a [`LineSource`](super::LineSource).
///
/// Open and read failures carry the path so the error channel can show
/// which file misbehaved without the caller having to track it.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("line {index} is out of range (source has {count} lines)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} shrank from {previous} to {current} bytes while open", path.display())]
    Truncated {
        path: PathBuf,
        previous: u64,
        current: u64,
    },

    #[error("background task panicked: {0}")]
    Panicked(String),
}

impl SourceError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SourceError::Open {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SourceError::Read {
            path: path.into(),
            source,
        }
    }

    /// True for errors that mean the file itself is gone or unusable,
    /// as opposed to a bad index or a bug in a background task.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            SourceError::Open { .. } | SourceError::Read { .. } | SourceError::Truncated { .. }
        )
    }
}

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Found illegal chars in file or folder names!")]
    NameViolation { paths: Vec<PathBuf> },

    #[error("Found duplicate files!")]
    DuplicateFound { groups: Vec<Vec<PathBuf>> },

    #[error("Found unprotected files or directories!")]
    ProtectionViolation { paths: Vec<PathBuf> },

    #[error("Found RAW derivatives!")]
    RawDerivativeSuspected { groups: Vec<Vec<PathBuf>> },

    #[error("Found files in wrong locations!")]
    PathStructureViolation { paths: Vec<PathBuf> },

    #[error("Found missing files or files with wrong checksum!")]
    ChecksumMismatch {
        mismatched: Vec<PathBuf>,
        missing: Vec<PathBuf>,
    },

    #[error("Found missing files!")]
    MissingFile { paths: Vec<PathBuf> },

    #[error("{0}")]
    PreconditionNotMet(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Serialisation error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionNotMet(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the failures produced by an integrity check category, as
    /// opposed to configuration, precondition or I/O problems.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::NameViolation { .. }
                | Self::DuplicateFound { .. }
                | Self::ProtectionViolation { .. }
                | Self::RawDerivativeSuspected { .. }
                | Self::PathStructureViolation { .. }
                | Self::ChecksumMismatch { .. }
                | Self::MissingFile { .. }
        )
    }
}

/// Attaches the offending path to a bare `io::Error`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::io(path, source))
    }
}

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// The closed set of failures a [`crate::maven::remote_repo::RepositoryFetcher`] may report.
///  Transport specific errors are translated into one of these exactly once, inside the fetcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found in repository: {0}")]
    NotFound(String),
    #[error("access denied by repository: {0}")]
    AccessDenied(String),
    #[error("transfer failed: {0}")]
    TransferFailed(String),
    #[error("connection to repository failed: {0}")]
    Connection(String),
}

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no {reference} version found for {group}:{artifact}")]
    VersionNotFound {
        reference: String,
        group: String,
        artifact: String,
    },

    #[error("malformed maven-metadata.xml: {0}")]
    MalformedMetadata(String),

    #[error("storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("invalid artifact coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("no entry {entry:?} in {}", archive.display())]
    EntryNotFound {
        archive: PathBuf,
        entry: String,
    },

    #[error("cannot read archive {}: {message}", archive.display())]
    InvalidArchive {
        archive: PathBuf,
        message: String,
    },

    #[error("{message}")]
    Repository {
        message: String,
        #[source]
        source: Option<Box<RepoError>>,
    },
}

impl RepoError {
    pub fn storage(path: impl AsRef<Path>, source: io::Error) -> RepoError {
        RepoError::Storage {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub fn repository(message: impl Into<String>) -> RepoError {
        RepoError::Repository {
            message: message.into(),
            source: None,
        }
    }

    pub fn wrapping(message: impl Into<String>, cause: RepoError) -> RepoError {
        RepoError::Repository {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// true if this failure means 'the requested thing does not exist' as opposed to some
    ///  technical problem, looking through wrapping `Repository` errors
    pub fn is_missing(&self) -> bool {
        match self {
            RepoError::Fetch(FetchError::NotFound(_)) => true,
            RepoError::VersionNotFound { .. } => true,
            RepoError::EntryNotFound { .. } => true,
            RepoError::Repository { source: Some(cause), .. } => cause.is_missing(),
            _ => false,
        }
    }

    /// the innermost wrapped error
    pub fn root_cause(&self) -> &RepoError {
        match self {
            RepoError::Repository { source: Some(cause), .. } => cause.root_cause(),
            other => other,
        }
    }
}

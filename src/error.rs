use crate::frontmatter::FrontmatterError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while walking and parsing the content corpus.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed front-matter in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },

    #[error("Duplicate document id {id} from {path} (already produced by {first})")]
    DuplicateId {
        id: String,
        path: PathBuf,
        first: PathBuf,
    },
}

impl ScanError {
    /// Path of the file or directory the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            ScanError::Filesystem { path, .. }
            | ScanError::Parse { path, .. }
            | ScanError::DuplicateId { path, .. } => path,
        }
    }
}

/// Failures reported by a search backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Search engine unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Search engine rejected the request ({status}, {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Task {task_uid} failed ({code}): {message}")]
    TaskFailed {
        task_uid: u64,
        code: String,
        message: String,
    },

    #[error("Task {task_uid} did not finish within {timeout:?}")]
    TaskTimeout { task_uid: u64, timeout: Duration },

    #[error("Index `{0}` not found")]
    IndexNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub(crate) fn rejected(status: u16, code: &str, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Why an index initialization attempt failed.
#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Errors surfaced by [`crate::SearchService`].
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search index initialization failed: {0}")]
    IndexInit(#[source] InitError),

    #[error("Search query failed: {0}")]
    Query(#[source] BackendError),

    #[error("Search query timed out after {0:?}")]
    Timeout(Duration),
}

impl From<InitError> for SearchError {
    fn from(err: InitError) -> Self {
        SearchError::IndexInit(err)
    }
}

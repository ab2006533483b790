// Error kinds for the upload pipeline. Every failure surfaces at the top
// level of the run as a single human-readable message; nothing is retried.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source path is neither a regular file nor a directory (missing,
    /// broken symlink, device file, ...).
    #[error("source path {} is neither a regular file nor a directory", .0.display())]
    InvalidSource(PathBuf),

    /// The backend answered an upload or poll request with a non-2xx status.
    /// `body` is a best-effort read of the response body, empty when it
    /// could not be read.
    #[error("backend responded {status} {status_text}\n{body}")]
    Upload {
        status: u16,
        status_text: String,
        body: String,
    },

    /// A named artifact was absent from the store, or its download produced
    /// no file.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// The poll deadline elapsed without a terminal status.
    #[error("Timed out after {0} minutes waiting for the backend result")]
    Timeout(i64),

    /// The backend reported a terminal non-success status.
    #[error("Backend reported failure (status \"{0}\")")]
    BackendFailure(String),

    /// Polling was requested but the backend gave neither a terminal status
    /// nor a poll URL.
    #[error("backend response carries no status and no status URL to poll")]
    Protocol,

    /// The external archiving command failed.
    #[error("archiving {} failed: {detail}", .path.display())]
    Archive { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

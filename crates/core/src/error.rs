//! Unified error types for vestibule.

use tokio_rusqlite::rusqlite;

/// Unified error types for the vestibule proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty version tag).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("store error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("store error: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Network transport failure (connect, read, DNS). An HTTP error
    /// status is not a transport failure and is never reported here.
    #[error("network error: {0}")]
    Network(String),

    /// The network attempt exceeded the configured timeout.
    #[error("network timeout: {0}")]
    FetchTimeout(String),

    /// Response body exceeded the configured byte limit.
    #[error("response too large: {0}")]
    FetchTooLarge(String),

    /// A manifest resource failed to fetch during install; the whole
    /// install was abandoned and the prior active store is untouched.
    #[error("install of version {version} failed at {resource}: {reason}")]
    InstallFailed {
        version: String,
        resource: String,
        reason: String,
    },

    /// Activation was requested for a version tag with no installed store.
    #[error("no installed store for version {0}")]
    StoreMissing(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

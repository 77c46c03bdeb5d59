//! Unified error types for squall.

use tokio_rusqlite::rusqlite;

/// Errors shared by the store, the fetch mechanism, and the interception
/// policy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g., an empty manifest entry or a bad method token).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The transport never produced a response (DNS, connect, reset).
    #[error("NETWORK_UNREACHABLE: {0}")]
    NetworkUnreachable(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP-level failure while sending a request or reading a response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
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

/// Failure of one precache initialization pass.
///
/// The pass is all-or-nothing: the first entry that cannot be fetched or
/// stored sinks the whole pass, and the error names that entry where one
/// is identifiable.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The network was unreachable while fetching a manifest entry.
    #[error("PRECACHE_NETWORK: {id}: {source}")]
    NetworkUnavailable {
        id: String,
        #[source]
        source: Error,
    },

    /// The store could not be opened or written.
    #[error("PRECACHE_STORE: {0}")]
    StorageUnavailable(#[source] Error),

    /// A single manifest entry failed (bad status, oversized body, bad URL).
    #[error("PRECACHE_ENTRY: {id}: {source}")]
    PartialManifestFailure {
        id: String,
        #[source]
        source: Error,
    },
}

impl InitError {
    /// The manifest entry that sank the pass, when one is identifiable.
    pub fn failed_id(&self) -> Option<&str> {
        match self {
            InitError::NetworkUnavailable { id, .. } | InitError::PartialManifestFailure { id, .. } => Some(id),
            InitError::StorageUnavailable(_) => None,
        }
    }

    /// Classify a fetch-mechanism error against a manifest entry.
    ///
    /// Transport-level failures mean the network itself is unavailable;
    /// everything else is a defect of that one entry.
    pub(crate) fn from_fetch(id: &str, source: Error) -> Self {
        match source {
            Error::NetworkUnreachable(_) | Error::FetchTimeout(_) => {
                InitError::NetworkUnavailable { id: id.to_string(), source }
            }
            _ => InitError::PartialManifestFailure { id: id.to_string(), source },
        }
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriveError>;

/// Failure talking to the storage provider.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(err: serde_json::Error) -> Self {
        DriveError::Parse(err.to_string())
    }
}

/// Failure enumerating a folder.
#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("not a folder link: {0:?}")]
    InvalidFolderLocator(String),

    #[error("listing unavailable (page {page}): {source}")]
    ListingUnavailable {
        page: usize,
        #[source]
        source: DriveError,
    },
}

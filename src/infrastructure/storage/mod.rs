//! Distributed storage: endpoint discovery, liveness race, and file upload.

pub mod discovery;
pub mod upload;

use thiserror::Error;

pub use discovery::{fastest_endpoint, QueryNodeDiscovery, StorageDiscovery, StorageEndpoint};
pub use upload::{upload_file, UploadTarget};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid storage endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("query node error: {0}")]
    QueryNode(String),
    #[error("bag {0} not found")]
    BagNotFound(String),
    #[error("no responsive storage endpoint among {candidates} candidates")]
    NoLiveEndpoint { candidates: usize },
    #[error("upload rejected with HTTP {status}: {body}")]
    UploadRejected { status: u16, body: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Joins `path` onto a node endpoint, tolerating a missing trailing slash.
pub(crate) fn endpoint_url(endpoint: &str, path: &str) -> StorageResult<url::Url> {
    let base = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    };
    url::Url::parse(&base)
        .and_then(|base| base.join(path))
        .map_err(|e| StorageError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

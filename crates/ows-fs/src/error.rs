//! Error types for ows-fs

use std::path::PathBuf;

/// Result type for ows-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating or loading configuration documents
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON document {location}: {message}")]
    JsonParse { location: String, message: String },

    #[error("Unsupported URL scheme in config inheritance: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error(
        "Please set environment variable 'DATACUBE_OWS_CFG_ALLOW_S3=YES' to enable OWS config from AWS S3"
    )]
    RemoteDisabled { url: String },

    #[error("No object store configured to fetch {url}")]
    NoObjectStore { url: String },

    #[error("Failed to fetch {url}: {message}")]
    Remote { url: String, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

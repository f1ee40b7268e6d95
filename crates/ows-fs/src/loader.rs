//! JSON document loading from local files and object storage

use std::fmt;
use std::fs;
use std::sync::Arc;

use serde_json::Value;

use crate::{DocumentRef, Error, Result};

/// Source of remote configuration documents (e.g. an S3 client).
pub trait ObjectStore: Send + Sync {
    /// Fetch the raw bytes at `url`.
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String>;
}

/// Loads JSON configuration documents.
///
/// Remote documents are only reachable when remote loading is enabled and an
/// [`ObjectStore`] has been supplied.
#[derive(Clone, Default)]
pub struct DocumentLoader {
    allow_remote: bool,
    store: Option<Arc<dyn ObjectStore>>,
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("allow_remote", &self.allow_remote)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl DocumentLoader {
    /// A loader for local documents only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, allow_remote: bool) -> Self {
        self.allow_remote = allow_remote;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn allow_remote(&self) -> bool {
        self.allow_remote
    }

    /// Load and parse the JSON document at `doc`.
    pub fn load(&self, doc: &DocumentRef) -> Result<Value> {
        let bytes = match doc {
            DocumentRef::Local(path) => {
                let native = path.to_native();
                fs::read(&native).map_err(|e| Error::io(&native, e))?
            }
            DocumentRef::Remote(url) => {
                if !self.allow_remote {
                    return Err(Error::RemoteDisabled { url: url.clone() });
                }
                let store = self
                    .store
                    .as_ref()
                    .ok_or_else(|| Error::NoObjectStore { url: url.clone() })?;
                store.fetch(url).map_err(|message| Error::Remote {
                    url: url.clone(),
                    message,
                })?
            }
        };
        tracing::debug!(document = %doc, bytes = bytes.len(), "Loaded config document");
        serde_json::from_slice(&bytes).map_err(|e| Error::JsonParse {
            location: doc.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NormalizedPath;

    struct FixedStore;

    impl ObjectStore for FixedStore {
        fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
            if url.ends_with("cfg.json") {
                Ok(br#"{"test": 5}"#.to_vec())
            } else {
                Err("NoSuchKey".into())
            }
        }
    }

    #[test]
    fn missing_local_file_is_io_error() {
        let loader = DocumentLoader::new();
        let doc = DocumentRef::Local(NormalizedPath::new("/nonexistent/ows/cfg.json"));
        assert!(matches!(loader.load(&doc), Err(Error::Io { .. })));
    }

    #[test]
    fn remote_requires_opt_in() {
        let loader = DocumentLoader::new().with_store(Arc::new(FixedStore));
        let doc = DocumentRef::Remote("s3://bucket/cfg.json".into());
        assert!(matches!(loader.load(&doc), Err(Error::RemoteDisabled { .. })));

        let loader = loader.with_remote(true);
        assert_eq!(loader.load(&doc).unwrap()["test"], 5);
    }

    #[test]
    fn remote_without_store_fails() {
        let loader = DocumentLoader::new().with_remote(true);
        let doc = DocumentRef::Remote("s3://bucket/cfg.json".into());
        assert!(matches!(loader.load(&doc), Err(Error::NoObjectStore { .. })));
    }

    #[test]
    fn remote_fetch_error_is_reported() {
        let loader = DocumentLoader::new()
            .with_remote(true)
            .with_store(Arc::new(FixedStore));
        let doc = DocumentRef::Remote("s3://bucket/other.json".into());
        assert!(matches!(loader.load(&doc), Err(Error::Remote { .. })));
    }
}

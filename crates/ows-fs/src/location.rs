//! Local and remote "working directories" for configuration documents
//!
//! A configuration document included by path may live on the local
//! filesystem or, when explicitly enabled, in S3. Nested includes are
//! resolved relative to the directory (or URL prefix) of the including
//! document, so both cases are modelled as a [`ConfigLocation`].

use crate::{Error, NormalizedPath, Result};

/// Environment variable enabling `s3://` configuration documents.
pub const ALLOW_S3_ENV: &str = "DATACUBE_OWS_CFG_ALLOW_S3";
/// Short spelling of [`ALLOW_S3_ENV`], read when that is unset.
pub const ALLOW_S3_ENV_SHORT: &str = "OWS_CFG_ALLOW_S3";

const REMOTE_SCHEMES: &[&str] = &["s3"];

pub fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "yes" | "true" | "1" | "y")
}

/// A reference to a single configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    Local(NormalizedPath),
    Remote(String),
}

impl DocumentRef {
    /// Classify a raw include path by URL scheme.
    ///
    /// Paths without a scheme are local. `s3://` is accepted only when
    /// `allow_remote` is set; every other scheme is rejected.
    pub fn parse(raw: &str, allow_remote: bool) -> Result<Self> {
        match url_scheme(raw) {
            None => Ok(Self::Local(NormalizedPath::new(raw))),
            Some(scheme) if REMOTE_SCHEMES.contains(&scheme.as_str()) => {
                if !allow_remote {
                    return Err(Error::RemoteDisabled {
                        url: raw.to_string(),
                    });
                }
                Ok(Self::Remote(raw.to_string()))
            }
            Some(scheme) => Err(Error::UnsupportedScheme { scheme }),
        }
    }

    /// The location nested includes of this document are resolved against.
    pub fn location(&self) -> Result<ConfigLocation> {
        match self {
            Self::Local(path) => {
                let absolute = path.absolute()?;
                let dir = absolute.parent().unwrap_or(absolute);
                Ok(ConfigLocation::Local(dir))
            }
            Self::Remote(url) => {
                let (prefix, _) = url.rsplit_once('/').unwrap_or((url.as_str(), ""));
                Ok(ConfigLocation::Remote(prefix.to_string()))
            }
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{path}"),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// The directory (or URL prefix) that relative include paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    Local(NormalizedPath),
    Remote(String),
}

impl ConfigLocation {
    /// The process working directory.
    pub fn current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        Ok(Self::Local(NormalizedPath::new(cwd)))
    }

    /// Resolve a raw include path relative to this location.
    pub fn resolve(&self, raw: &str, allow_remote: bool) -> Result<DocumentRef> {
        if url_scheme(raw).is_some() {
            return DocumentRef::parse(raw, allow_remote);
        }
        match self {
            Self::Local(dir) => Ok(DocumentRef::Local(dir.join(raw))),
            Self::Remote(prefix) => Ok(DocumentRef::Remote(format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                raw.trim_start_matches("./")
            ))),
        }
    }
}

impl std::fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{path}"),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Location of the directory containing a configuration document.
///
/// Returns the absolute directory for a local file, and the URL prefix for a
/// remote one.
pub fn file_loc(raw: &str, allow_remote: bool) -> Result<ConfigLocation> {
    DocumentRef::parse(raw, allow_remote)?.location()
}

fn url_scheme(raw: &str) -> Option<String> {
    let (scheme, _) = raw.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_lowercase())
}

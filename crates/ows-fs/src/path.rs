//! Normalized path handling for configuration documents

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A filesystem path normalized to forward slashes.
///
/// Include directives are written by hand in JSON and may use either
/// separator; they are normalized on entry and converted back to the
/// platform form only when the file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: path_str.replace('\\', "/"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// The path in platform form, for opening the file.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || self.to_native().is_absolute()
    }

    /// Join this path with a relative segment.
    ///
    /// An absolute segment replaces the base, matching `os.path.join`-style
    /// semantics that configuration authors expect.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        if segment.starts_with('/') || Path::new(&segment).is_absolute() {
            return Self { inner: segment };
        }
        let segment = segment.trim_start_matches("./");
        let joined = if self.inner.is_empty() {
            segment.to_string()
        } else if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment)
        } else {
            format!("{}/{}", self.inner, segment)
        };
        Self { inner: joined }
    }

    /// The containing directory; `None` for a bare file name.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            None => None,
        }
    }

    /// Resolve against the process working directory.
    ///
    /// Existing files are canonicalized (without UNC prefixes on Windows);
    /// paths that do not exist yet are made absolute lexically.
    pub fn absolute(&self) -> Result<Self> {
        let native = self.to_native();
        if let Ok(canonical) = dunce::canonicalize(&native) {
            return Ok(Self::new(canonical));
        }
        let absolute = std::path::absolute(&native).map_err(|e| Error::io(&native, e))?;
        Ok(Self::new(absolute))
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslashes_are_normalized() {
        let path = NormalizedPath::new("cfg\\layers\\a.json");
        assert_eq!(path.as_str(), "cfg/layers/a.json");
    }

    #[test]
    fn join_relative_and_absolute_segments() {
        let base = NormalizedPath::new("/etc/ows");
        assert_eq!(base.join("a.json").as_str(), "/etc/ows/a.json");
        assert_eq!(base.join("./a.json").as_str(), "/etc/ows/a.json");
        assert_eq!(base.join("/srv/b.json").as_str(), "/srv/b.json");
    }

    #[test]
    fn parent_directories() {
        let path = NormalizedPath::new("/etc/ows/a.json");
        assert_eq!(path.parent().unwrap().as_str(), "/etc/ows");
        assert_eq!(NormalizedPath::new("cfg/layers/").parent().unwrap().as_str(), "cfg");
        assert_eq!(NormalizedPath::new("/a.json").parent().unwrap().as_str(), "/");
        assert!(NormalizedPath::new("a.json").parent().is_none());
    }

    #[test]
    fn absolute_is_rooted() {
        let path = NormalizedPath::new("does/not/exist.json").absolute().unwrap();
        assert!(path.is_absolute());
        assert!(path.as_str().ends_with("does/not/exist.json"));
    }
}

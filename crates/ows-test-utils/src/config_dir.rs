//! [`ConfigDir`]: a temporary directory of JSON configuration documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

/// A temporary directory populated with configuration documents.
///
/// # Example
///
/// ```rust,no_run
/// use ows_test_utils::config_dir::ConfigDir;
/// use serde_json::json;
///
/// let dir = ConfigDir::new();
/// dir.write_json("layers/ls8.json", &json!({"name": "ls8"}));
/// dir.assert_file_exists("layers/ls8.json");
/// ```
pub struct ConfigDir {
    temp_dir: TempDir,
}

impl Default for ConfigDir {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `rel` inside the directory.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Absolute path of `rel` as a string, for use in `include` directives.
    pub fn path_str(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().replace('\\', "/")
    }

    /// Write `value` as pretty-printed JSON to `rel`, creating parent
    /// directories. Returns the absolute path written.
    pub fn write_json(&self, rel: &str, value: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(value).unwrap();
        self.write_text(rel, &text)
    }

    /// Write raw text (e.g. deliberately invalid JSON) to `rel`.
    pub fn write_text(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text)
            .unwrap_or_else(|e| panic!("ConfigDir::write_text: {}: {e}", path.display()));
        path
    }

    /// # Panics
    /// Panics with a descriptive message if `rel` does not exist.
    pub fn assert_file_exists(&self, rel: &str) {
        let full_path = self.path(rel);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_nested_documents() {
        let dir = ConfigDir::new();
        let path = dir.write_json("a/b/c.json", &json!({"test": 1}));
        dir.assert_file_exists("a/b/c.json");
        let back: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, json!({"test": 1}));
    }
}

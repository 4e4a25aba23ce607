//! Store configuration
//!
//! ```toml
//! root_dir = "/home/me/figures"
//! key_file_name = "key.bin"
//! alert_message = "Hold your device near a tag to write."
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default key file name, looked up in the root directory
pub const DEFAULT_KEY_FILE: &str = "key.bin";

/// Default prompt shown while polling
pub const DEFAULT_ALERT: &str = "Hold your device near a tag to write.";

/// Where source images and key material live, and what the reader shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding figure dumps and the key file
    pub root_dir: PathBuf,
    /// Key file name inside `root_dir`
    pub key_file_name: String,
    /// Prompt shown by the reader while polling
    pub alert_message: String,
}

impl StoreConfig {
    /// Default configuration rooted at the current directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With root directory
    #[inline]
    #[must_use]
    pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = root.into();
        self
    }

    /// With key file name
    #[inline]
    #[must_use]
    pub fn with_key_file_name(mut self, name: impl Into<String>) -> Self {
        self.key_file_name = name.into();
        self
    }

    /// With polling prompt
    #[inline]
    #[must_use]
    pub fn with_alert_message(mut self, message: impl Into<String>) -> Self {
        self.alert_message = message.into();
        self
    }

    /// Full path of the key file
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.root_dir.join(&self.key_file_name)
    }

    /// Whether `item` is the key file itself
    #[must_use]
    pub fn is_key_file(&self, item: &Path) -> bool {
        item.file_name()
            .is_some_and(|name| name == self.key_file_name.as_str())
    }

    /// Parse a TOML document; missing keys take defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` on invalid TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` or `ConfigError::Parse`
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            key_file_name: DEFAULT_KEY_FILE.to_string(),
            alert_message: DEFAULT_ALERT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str("root_dir = \"/srv/figures\"").unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/srv/figures"));
        assert_eq!(config.key_file_name, "key.bin");
        assert_eq!(config.key_path(), PathBuf::from("/srv/figures/key.bin"));
        assert_eq!(config.alert_message, DEFAULT_ALERT);
    }

    #[test]
    fn bad_toml_is_reported() {
        assert!(matches!(
            StoreConfig::from_toml_str("root_dir = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn key_file_detection() {
        let config = StoreConfig::new().with_key_file_name("retail.bin");
        assert!(config.is_key_file(Path::new("/a/b/retail.bin")));
        assert!(!config.is_key_file(Path::new("/a/b/key.bin")));
    }

    #[test]
    fn missing_file() {
        let err = StoreConfig::from_toml_file(Path::new("/nonexistent/tagsmith.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagsmith.toml");
        std::fs::write(
            &path,
            "root_dir = \"/srv/figures\"\nkey_file_name = \"retail.bin\"\n",
        )
        .unwrap();

        let config = StoreConfig::from_toml_file(&path).unwrap();
        assert_eq!(
            config,
            StoreConfig::new()
                .with_root_dir("/srv/figures")
                .with_key_file_name("retail.bin")
        );
    }
}

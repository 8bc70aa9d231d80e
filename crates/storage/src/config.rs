//! Storage configuration.
//!
//! Built programmatically or from environment variables:
//! - `SMARTPDF_DATA_DIR`: directory holding the key-value files
//! - `SMARTPDF_RECENT_CAPACITY`: maximum number of recent files (default: 20)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::ConfigError;
use crate::file_store::FileStore;
use crate::recent::DEFAULT_RECENT_CAPACITY;

pub const DATA_DIR_ENV: &str = "SMARTPDF_DATA_DIR";
pub const RECENT_CAPACITY_ENV: &str = "SMARTPDF_RECENT_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory for the file-backed store
    pub data_dir: PathBuf,
    /// Capacity of the recent-files list
    pub recent_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: Self::default_data_dir(), recent_capacity: DEFAULT_RECENT_CAPACITY }
    }
}

impl StorageConfig {
    /// Platform data directory for the app.
    ///
    /// - macOS: ~/Library/Application Support/dev.SmartPDF.SmartPDF
    /// - Linux: ~/.local/share/smartpdf
    /// - Windows: %LOCALAPPDATA%\SmartPDF\SmartPDF\data
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("dev", "SmartPDF", "SmartPDF")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("smartpdf-data"))
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }

    /// Defaults overridden by whichever environment variables are set.
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value. A capacity of
    /// zero is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var(DATA_DIR_ENV) {
            if val.trim().is_empty() {
                return Err(ConfigError::InvalidValue(DATA_DIR_ENV.to_string()));
            }
            config.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(RECENT_CAPACITY_ENV) {
            config.recent_capacity = val
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or_else(|| ConfigError::InvalidValue(RECENT_CAPACITY_ENV.to_string()))?;
        }

        Ok(config)
    }

    /// File-backed store rooted at `data_dir`.
    pub fn file_store(&self) -> FileStore {
        FileStore::with_root(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.recent_capacity, 20);
        assert!(!config.data_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let config = StorageConfig::default().with_data_dir("/custom/path").with_recent_capacity(10);

        assert_eq!(config.data_dir, PathBuf::from("/custom/path"));
        assert_eq!(config.recent_capacity, 10);
        assert_eq!(config.file_store().root(), Path::new("/custom/path"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&[DATA_DIR_ENV, RECENT_CAPACITY_ENV]);

        env::set_var(DATA_DIR_ENV, "/tmp/smartpdf-test");
        env::set_var(RECENT_CAPACITY_ENV, "10");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/smartpdf-test"));
        assert_eq!(config.recent_capacity, 10);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&[DATA_DIR_ENV, RECENT_CAPACITY_ENV]);

        env::remove_var(DATA_DIR_ENV);
        env::set_var(RECENT_CAPACITY_ENV, "5");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.recent_capacity, 5);
        assert_eq!(config.data_dir, StorageConfig::default_data_dir());
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&[DATA_DIR_ENV, RECENT_CAPACITY_ENV]);
        env::remove_var(DATA_DIR_ENV);

        for bad in ["not_a_number", "0", "-3"] {
            env::set_var(RECENT_CAPACITY_ENV, bad);
            let result = StorageConfig::from_env();
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref key)) if key == RECENT_CAPACITY_ENV),
                "{bad} should be rejected"
            );
        }
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }
}

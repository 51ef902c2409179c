use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::PageLayout;

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// 10 MiB of frame memory
pub const DEFAULT_POOL_SIZE: usize = 10 * 1024 * 1024;

/// Smallest page that still fits every layout's header and a one-byte tuple
pub const MIN_PAGE_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Page size {0} outside {min}..={max}", min = MIN_PAGE_SIZE, max = u16::MAX)]
    InvalidPageSize(usize),

    #[error("Pool size {pool_size} cannot hold a page of {page_size} bytes")]
    InvalidPoolSize { pool_size: usize, page_size: usize },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub page_size: usize,
    /// Bytes of frame memory in the buffer pool
    pub pool_size: usize,
    pub default_layout: PageLayout,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            default_layout: PageLayout::Slotted,
        }
    }
}

impl StorageConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_default_layout(mut self, layout: PageLayout) -> Self {
        self.default_layout = layout;
        self
    }

    /// Read a JSON config file; missing keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(MIN_PAGE_SIZE..=u16::MAX as usize).contains(&self.page_size) {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.pool_size < self.page_size {
            return Err(ConfigError::InvalidPoolSize {
                pool_size: self.pool_size,
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    /// Number of frames the pool will hold
    pub fn num_frames(&self) -> usize {
        self.pool_size / self.page_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.num_frames(), 2560);
        assert_eq!(config.default_layout, PageLayout::Slotted);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        let too_small = StorageConfig::new("d").with_page_size(MIN_PAGE_SIZE - 1);
        assert!(matches!(too_small.validate(), Err(ConfigError::InvalidPageSize(_))));

        let too_large = StorageConfig::new("d").with_page_size(65536);
        assert!(matches!(too_large.validate(), Err(ConfigError::InvalidPageSize(65536))));

        StorageConfig::new("d")
            .with_page_size(u16::MAX as usize)
            .validate()
            .unwrap();

        let tiny_pool = StorageConfig::new("d").with_pool_size(100);
        assert!(matches!(
            tiny_pool.validate(),
            Err(ConfigError::InvalidPoolSize { pool_size: 100, .. })
        ));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pagedb.json");
        fs::write(&path, r#"{ "data_dir": "/tmp/x", "default_layout": "columnar" }"#).unwrap();

        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.default_layout, PageLayout::Columnar);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pagedb.json");

        fs::write(&path, r#"{ "page_size": 16 }"#).unwrap();
        assert!(matches!(StorageConfig::load(&path), Err(ConfigError::InvalidPageSize(16))));

        fs::write(&path, r#"{ "default_layout": "heap" }"#).unwrap();
        assert!(matches!(StorageConfig::load(&path), Err(ConfigError::JsonError(_))));

        assert!(matches!(
            StorageConfig::load(temp_dir.path().join("missing.json")),
            Err(ConfigError::IoError(_))
        ));
    }
}

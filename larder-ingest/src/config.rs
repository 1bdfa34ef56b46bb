//! larder-ingest service configuration
//!
//! Loaded from `<data-dir>/larder-ingest.toml` with environment overrides
//! for the extraction service settings. A missing file means defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use larder_common::Result;

/// Default upload cap: 10 MiB
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Full service configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub extraction: ExtractionConfig,
    pub ingest: IngestConfig,

    /// Resolved at load time, never read from the file
    #[serde(skip)]
    pub data_dir: PathBuf,
}

/// External extraction service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.receiptsense.example/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Ingestion workflow settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Largest accepted image payload in bytes
    pub max_upload_bytes: usize,
    /// Delay between status queries
    pub poll_interval_ms: u64,
    /// Status queries issued before reporting a timeout
    pub poll_max_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            poll_interval_ms: 2000,
            poll_max_attempts: 20,
        }
    }
}

impl ServiceConfig {
    /// Load configuration for the given data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("larder-ingest.toml");
        let mut config: ServiceConfig = larder_common::config::load_toml_config(&config_path)?;
        config.data_dir = data_dir.to_path_buf();

        // Environment overrides for the extraction service
        if let Ok(base_url) = std::env::var("LARDER_EXTRACTION_BASE_URL") {
            if !base_url.is_empty() {
                config.extraction.base_url = base_url;
            }
        }
        if let Ok(api_key) = std::env::var("LARDER_EXTRACTION_API_KEY") {
            if !api_key.is_empty() {
                config.extraction.api_key = api_key;
            }
        }

        Ok(config)
    }

    /// Path of the sqlite database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("larder.db")
    }

    /// Directory where submitted receipt images are stored
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("receipt-images")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_when_file_missing() {
        std::env::remove_var("LARDER_EXTRACTION_BASE_URL");
        std::env::remove_var("LARDER_EXTRACTION_API_KEY");

        let dir = tempfile::tempdir().expect("tempdir");
        let config = ServiceConfig::load(dir.path()).expect("load");

        assert_eq!(config.ingest.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ingest.poll_interval_ms, 2000);
        assert_eq!(config.ingest.poll_max_attempts, 20);
        assert_eq!(config.extraction.timeout_secs, 30);
        assert!(config.extraction.api_key.is_empty());
        assert_eq!(config.db_path(), dir.path().join("larder.db"));
        assert_eq!(config.image_dir(), dir.path().join("receipt-images"));
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_other_defaults() {
        std::env::remove_var("LARDER_EXTRACTION_BASE_URL");
        std::env::remove_var("LARDER_EXTRACTION_API_KEY");

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("larder-ingest.toml"),
            "[ingest]\npoll_max_attempts = 5\n",
        )
        .expect("write");

        let config = ServiceConfig::load(dir.path()).expect("load");
        assert_eq!(config.ingest.poll_max_attempts, 5);
        assert_eq!(config.ingest.poll_interval_ms, 2000);
    }

    #[test]
    #[serial]
    fn test_env_overrides_extraction_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("larder-ingest.toml"),
            "[extraction]\nbase_url = \"https://file.example\"\napi_key = \"from-file\"\n",
        )
        .expect("write");

        std::env::set_var("LARDER_EXTRACTION_BASE_URL", "https://env.example");
        std::env::set_var("LARDER_EXTRACTION_API_KEY", "from-env");
        let config = ServiceConfig::load(dir.path()).expect("load");
        std::env::remove_var("LARDER_EXTRACTION_BASE_URL");
        std::env::remove_var("LARDER_EXTRACTION_API_KEY");

        assert_eq!(config.extraction.base_url, "https://env.example");
        assert_eq!(config.extraction.api_key, "from-env");
    }
}

//! Configuration loading and data directory resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Data directory resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: OS-dependent compiled default
    default_data_dir()
}

/// Get OS-dependent default data directory path
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/larder
        dirs::data_local_dir()
            .map(|d| d.join("larder"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/larder"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/larder
        dirs::data_dir()
            .map(|d| d.join("larder"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/larder"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\larder
        dirs::data_local_dir()
            .map(|d| d.join("larder"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\larder"))
    } else {
        PathBuf::from("./larder_data")
    }
}

/// Read and parse a TOML config file into `T`, returning `T::default()`
/// when the file does not exist
pub fn load_toml_config<T>(path: &std::path::Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_arg_wins_over_env() {
        std::env::set_var("LARDER_TEST_DATA_DIR", "/tmp/from-env");
        let dir = resolve_data_dir(Some("/tmp/from-cli"), "LARDER_TEST_DATA_DIR");
        std::env::remove_var("LARDER_TEST_DATA_DIR");
        assert_eq!(dir, PathBuf::from("/tmp/from-cli"));
    }

    #[test]
    #[serial]
    fn test_env_wins_over_default() {
        std::env::set_var("LARDER_TEST_DATA_DIR", "/tmp/from-env");
        let dir = resolve_data_dir(None, "LARDER_TEST_DATA_DIR");
        std::env::remove_var("LARDER_TEST_DATA_DIR");
        assert_eq!(dir, PathBuf::from("/tmp/from-env"));
    }

    #[test]
    #[serial]
    fn test_default_when_nothing_set() {
        std::env::remove_var("LARDER_TEST_DATA_DIR");
        let dir = resolve_data_dir(None, "LARDER_TEST_DATA_DIR");
        assert_eq!(dir, default_data_dir());
    }

    #[derive(Debug, Default, serde::Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        answer: u32,
    }

    #[test]
    fn test_missing_toml_file_yields_default() {
        let parsed: Sample =
            load_toml_config(std::path::Path::new("/nonexistent/larder.toml"))
                .expect("missing file yields default");
        assert_eq!(parsed, Sample::default());
    }

    #[test]
    fn test_toml_file_parsed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sample.toml");
        std::fs::write(&path, "answer = 42\n").expect("write");

        let parsed: Sample = load_toml_config(&path).expect("parse");
        assert_eq!(parsed.answer, 42);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "answer = = 42\n").expect("write");

        let result: Result<Sample> = load_toml_config(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

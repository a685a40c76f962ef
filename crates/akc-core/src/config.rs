//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/akc/config.toml)
//! 3. Environment variables (AKC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "AKC";

/// Default preview length in characters
pub const DEFAULT_PREVIEW_CHARS: usize = 80;

/// Keys accepted by `Config::set_value`
pub const CONFIG_KEYS: &[&str] = &["data_dir", "content_dir", "log_file", "preview_chars"];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the clue store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Exported story content used for resolving clues (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_dir: Option<PathBuf>,

    /// Log destination; logs go to stderr when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Maximum preview length for new clues
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            content_dir: None,
            log_file: None,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (AKC_DATA_DIR, AKC_CONTENT_DIR)
    /// 2. Config file (~/.config/akc/config.toml or AKC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // AKC_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            if !val.is_empty() {
                self.data_dir = PathBuf::from(val);
            }
        }

        // AKC_CONTENT_DIR
        if let Ok(val) = std::env::var(format!("{}_CONTENT_DIR", ENV_PREFIX)) {
            self.content_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Update one setting from its textual form
    ///
    /// Optional paths are cleared with an empty value or `none`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let optional_path = |v: &str| -> Option<PathBuf> {
            if v.is_empty() || v == "none" {
                None
            } else {
                Some(PathBuf::from(v))
            }
        };

        match key {
            "data_dir" => {
                if value.is_empty() {
                    bail!("data_dir cannot be empty");
                }
                self.data_dir = PathBuf::from(value);
            }
            "content_dir" => self.content_dir = optional_path(value),
            "log_file" => self.log_file = optional_path(value),
            "preview_chars" => {
                let chars: usize = value
                    .parse()
                    .context("Invalid value for preview_chars. Use a positive number.")?;
                if chars == 0 {
                    bail!("preview_chars must be at least 1");
                }
                self.preview_chars = chars;
            }
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with AKC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("akc")
            .join("config.toml")
    }

    /// Directory holding the key-value store files
    pub fn kv_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Log file path, if logging to a file
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("akc")
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &["AKC_DATA_DIR", "AKC_CONTENT_DIR", "AKC_CONFIG"];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.content_dir.is_none());
        assert!(config.log_file.is_none());
        assert_eq!(config.preview_chars, 80);
        assert!(config.data_dir.ends_with("akc"));
    }

    #[test]
    fn test_kv_dir() {
        let config = Config {
            data_dir: PathBuf::from("/data/akc"),
            ..Config::default()
        };
        assert_eq!(config.kv_dir(), PathBuf::from("/data/akc/store"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("AKC_DATA_DIR", "/tmp/akc-test");
        config.apply_env_overrides();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/akc-test"));

        // Empty value is ignored
        env::set_var("AKC_DATA_DIR", "");
        config.apply_env_overrides();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/akc-test"));
    }

    #[test]
    fn test_env_override_content_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("AKC_CONTENT_DIR", "/srv/stories");
        config.apply_env_overrides();
        assert_eq!(config.content_dir, Some(PathBuf::from("/srv/stories")));

        // Empty string clears it
        env::set_var("AKC_CONTENT_DIR", "");
        config.apply_env_overrides();
        assert!(config.content_dir.is_none());
    }

    #[test]
    fn test_serialization() {
        let config = Config {
            data_dir: PathBuf::from("/data/akc"),
            content_dir: Some(PathBuf::from("/data/stories")),
            log_file: None,
            preview_chars: 40,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("content_dir"));
        assert!(!toml_str.contains("log_file"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            content_dir = "/custom/content"
            preview_chars = 120
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.content_dir, Some(PathBuf::from("/custom/content")));
        assert_eq!(config.preview_chars, 120);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        env::set_var("AKC_DATA_DIR", temp_dir.path().join("data"));

        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.preview_chars, DEFAULT_PREVIEW_CHARS);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        config.set_value("preview_chars", "32").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();

        config.set_value("content_dir", "/stories").unwrap();
        assert_eq!(config.content_dir, Some(PathBuf::from("/stories")));
        config.set_value("content_dir", "none").unwrap();
        assert!(config.content_dir.is_none());

        config.set_value("log_file", "/tmp/akc.log").unwrap();
        assert_eq!(config.log_path(), Some(Path::new("/tmp/akc.log")));

        assert!(config.set_value("preview_chars", "0").is_err());
        assert!(config.set_value("preview_chars", "lots").is_err());
        assert!(config.set_value("data_dir", "").is_err());

        let err = config.set_value("sync_url", "x").unwrap_err();
        assert!(err.to_string().contains("Valid keys"));
    }
}

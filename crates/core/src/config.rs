//! Configuration management
//!
//! Configuration lives in a TOML file: `$DATALAYER_CONFIG_DIR/config.toml`
//! when the variable is set, otherwise `<config dir>/datalayer/config.toml`.
//! A missing file is the default configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "DATALAYER_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Refuse local paths outside the working directory
    pub safe: bool,

    /// Alias name to base URL
    pub aliases: BTreeMap<String, String>,

    /// Key material to register in the crypto registry
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyConfig>,

    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safe: true,
            aliases: BTreeMap::new(),
            keys: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// One key pair entry. Exactly one of `private_key` or `public_key` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Registry name; defaults to the SHA-1 name of the public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// PKCS#8 PEM private key path, registers a decryptor and encryptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,

    /// SubjectPublicKeyInfo PEM path, registers an encryptor only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PathBuf>,

    /// Environment variable holding the private key password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

/// Retry policy for remote backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Loads and saves [`Config`] at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default configuration location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine the configuration directory".to_string()))?
                .join("datalayer"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    /// Manager for an explicit configuration file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory relative key paths are resolved against
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Load the configuration, or the default when the file does not exist
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.config_path.display(), "No configuration file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", self.config_path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, creating the directory if needed
    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let content = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }
}

impl Config {
    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        for (index, key) in self.keys.iter().enumerate() {
            match (&key.private_key, &key.public_key) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(Error::Config(format!(
                        "keys[{index}]: exactly one of private_key or public_key is required"
                    )));
                }
            }
            if key.public_key.is_some() && key.password_env.is_some() {
                return Err(Error::Config(format!(
                    "keys[{index}]: password_env only applies to private keys"
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

//! Configuration management for deltarepo

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache / working-directory configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Mirrors to consult when resolving an update
    #[serde(default)]
    pub mirrors: Vec<MirrorConfig>,

    /// Content-hash / checksum configuration
    #[serde(default)]
    pub hash: HashConfig,

    /// Cache gardener retention policy
    #[serde(default)]
    pub gardener: GardenerConfig,

    /// Download configuration
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory where materialised snapshots and scratch trees live
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/cache/deltarepo"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Mirror name, for diagnostics
    pub name: String,

    /// Mirror base URL (directory containing `deltarepos.xml.xz`)
    pub url: String,

    /// Whether this mirror is consulted
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashConfig {
    /// Content-hash algorithm name (`sha256`, `sha1`, `sha512`, `md5`, legacy `sha`)
    #[serde(default = "default_hash_algorithm")]
    pub algorithm: String,
}

fn default_hash_algorithm() -> String {
    "sha256".to_string()
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            algorithm: default_hash_algorithm(),
        }
    }
}

/// Cache gardener retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GardenerConfig {
    /// Keep at most this many snapshots (newest first); `None` disables the rule
    #[serde(default)]
    pub max_num: Option<i64>,

    /// Drop snapshots older than this many seconds; `None` disables the rule
    #[serde(default)]
    pub max_age: Option<i64>,
}

impl Default for GardenerConfig {
    fn default() -> Self {
        Self {
            max_num: None,
            max_age: None,
        }
    }
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds (0 = no timeout)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Number of retries for a failed fetch
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Whether to show download progress
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    600
}

fn default_retries() -> u32 {
    3
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            download_timeout_secs: default_download_timeout(),
            retries: default_retries(),
            show_progress: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            mirrors: vec![],
            hash: HashConfig::default(),
            gardener: GardenerConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.filter(|p| p.exists()).map(PathBuf::from).or_else(|| {
            let system_config = PathBuf::from("/etc/deltarepo/deltarepo.conf");
            if system_config.exists() {
                return Some(system_config);
            }

            directories::ProjectDirs::from("org", "rookery", "deltarepo")
                .map(|d| d.config_dir().join("deltarepo.conf"))
                .filter(|p| p.exists())
        });

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("failed to parse config: {}", path.display()))
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hash.algorithm, "sha256");
        assert!(config.mirrors.is_empty());
        assert!(config.gardener.max_num.is_none());
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/deltarepo.conf"))).unwrap();
        assert_eq!(config.hash.algorithm, "sha256");
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deltarepo.conf");
        std::fs::write(
            &path,
            r#"
            [hash]
            algorithm = "sha512"

            [[mirrors]]
            name = "primary"
            url = "https://mirror.example/deltas/"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.hash.algorithm, "sha512");
        assert_eq!(config.mirrors.len(), 1);
        assert_eq!(config.mirrors[0].name, "primary");
    }
}

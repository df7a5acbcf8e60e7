// src/config.rs

//! Inspection settings
//!
//! # Example config.toml
//!
//! ```toml
//! store_path = "/var/lib/sysdescribe/descriptions/web01"
//! root = "/"
//!
//! [scan]
//! start_depth = 3
//! max_depth = 6
//!
//! [archive]
//! compression = "zstd"
//!
//! [mounts]
//! extra_remote = ["fuse.rclone"]
//!
//! [filters]
//! default = ["/unmanaged_files/files/name=/tmp,/var/tmp"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compression::CompressionFormat;
use crate::error::{Error, Result};
use crate::filesystem::FsClassifier;
use crate::packages::stat::DEFAULT_BATCH_LIMIT;

/// Default location of the description directory
pub const DEFAULT_STORE_PATH: &str = "/var/lib/sysdescribe/descriptions";

/// File name looked up in the user configuration directory
pub const CONFIG_FILE: &str = "sysdescribe/config.toml";

/// Everything an inspection run can be tuned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Description directory; scope stores are created below it
    pub store_path: PathBuf,
    /// Where the inspected filesystem is reachable for extraction
    pub root: PathBuf,
    pub scan: ScanConfig,
    pub archive: ArchiveConfig,
    pub mounts: MountsConfig,
    pub filters: FiltersConfig,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            root: PathBuf::from("/"),
            scan: ScanConfig::default(),
            archive: ArchiveConfig::default(),
            mounts: MountsConfig::default(),
            filters: FiltersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// find depth below local mount points
    pub start_depth: usize,
    /// find depth everywhere else
    pub max_depth: usize,
    /// Maximum accumulated argument length of one `stat` call
    pub stat_batch_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_depth: 3,
            max_depth: 6,
            stat_batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub compression: CompressionFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountsConfig {
    pub extra_remote: Vec<String>,
    pub extra_special: Vec<String>,
}

impl MountsConfig {
    pub fn classifier(&self) -> FsClassifier {
        FsClassifier::with_extra(&self.extra_remote, &self.extra_special)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Filter definitions applied before command line options
    pub default: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            default: vec![
                "/unmanaged_files/files/name=/tmp,/var/tmp,/lost+found,/var/run,/var/lib/rpm,/.snapshots"
                    .to_string(),
            ],
        }
    }
}

impl InspectConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::parse(&content)
    }

    /// Load from `path`, else from the user config directory, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/sysdescribe/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.scan.start_depth == 0 || self.scan.max_depth == 0 {
            return Err(Error::ConfigError("scan depths must be at least 1".to_string()));
        }
        if self.scan.stat_batch_limit == 0 {
            return Err(Error::ConfigError("scan.stat_batch_limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = InspectConfig::parse("").unwrap();
        assert_eq!(config, InspectConfig::default());
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.scan.start_depth, 3);
        assert_eq!(config.scan.max_depth, 6);
        assert_eq!(config.scan.stat_batch_limit, 50_000);
        assert_eq!(config.archive.compression, CompressionFormat::Gzip);
    }

    #[test]
    fn test_partial_override() {
        let config = InspectConfig::parse(
            r#"
store_path = "/srv/descriptions/web01"

[scan]
max_depth = 4

[archive]
compression = "zstd"

[mounts]
extra_special = ["overlay"]

[filters]
default = []
"#,
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/srv/descriptions/web01"));
        assert_eq!(config.scan.start_depth, 3);
        assert_eq!(config.scan.max_depth, 4);
        assert_eq!(config.archive.compression, CompressionFormat::Zstd);
        assert_eq!(config.mounts.extra_special, vec!["overlay"]);
        assert!(config.filters.default.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        let err = InspectConfig::parse("store_path = [").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = InspectConfig::parse("[archive]\ncompression = \"xz\"").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_invalid_depth() {
        let err = InspectConfig::parse("[scan]\nstart_depth = 0").unwrap_err();
        assert!(err.to_string().contains("scan depths"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "root = \"/mnt/image\"").unwrap();
        let config = InspectConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.root, PathBuf::from("/mnt/image"));

        let err = InspectConfig::load(Some(Path::new("/does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}

use anyhow::{Context, Result};
use cgkit_core::{DeviceRate, GroupName, Hierarchy, IdRange};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main configuration for cgkit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Controller mount roots
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,

    /// Groups managed by `cgkit apply`
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

/// Where the controllers are mounted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Look the mount roots up in /proc/mounts (default: false)
    #[serde(default)]
    pub discover: bool,

    /// Explicit mount roots and membership file
    #[serde(flatten)]
    pub mounts: Hierarchy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily rotated logs here
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

/// One group and the tunables to apply per controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Group name relative to each mount root (e.g. "apache/worker")
    pub name: String,

    #[serde(default)]
    pub cpu: Option<CpuConfig>,

    #[serde(default)]
    pub cpuset: Option<CpusetConfig>,

    #[serde(default)]
    pub blkio: Option<BlkioConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuConfig {
    pub cfs_quota_us: Option<i64>,
    pub cfs_period_us: Option<i64>,
    pub shares: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpusetConfig {
    pub cpus: Option<IdRange>,
    pub mems: Option<IdRange>,
}

/// Throttle rules, each `"MAJOR:MINOR RATE"`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlkioConfig {
    #[serde(default)]
    pub throttle_read_bps_device: Vec<DeviceRate>,
    #[serde(default)]
    pub throttle_write_bps_device: Vec<DeviceRate>,
    #[serde(default)]
    pub throttle_read_iops_device: Vec<DeviceRate>,
    #[serde(default)]
    pub throttle_write_iops_device: Vec<DeviceRate>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use cgkit_cli::config::Config;
    ///
    /// let config = Config::load_from_file("/etc/cgkit/config.toml").unwrap();
    /// println!("groups: {}", config.groups.len());
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// A configuration with one sample group, written by `generate-config`
    pub fn example() -> Self {
        Self {
            groups: vec![GroupConfig {
                name: "cgkit/example".to_string(),
                cpu: Some(CpuConfig {
                    cfs_quota_us: Some(30000),
                    cfs_period_us: Some(100000),
                    shares: None,
                }),
                cpuset: None,
                blkio: None,
            }],
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.logging.level.trim().is_empty() {
            return Err("Log level must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            let name = GroupName::new(&group.name).map_err(|e| e.to_string())?;

            if name.is_root() {
                return Err("Root group cannot be managed by apply".to_string());
            }

            if !seen.insert(name.clone()) {
                return Err(format!("Duplicate group: {}", name));
            }

            if group.cpu.is_none() && group.cpuset.is_none() && group.blkio.is_none() {
                return Err(format!("Group {} has no controller section", name));
            }

            if let Some(cpu) = &group.cpu {
                if cpu.cfs_period_us.map_or(false, |p| p <= 0) {
                    return Err(format!("Group {}: cfs_period_us must be > 0", name));
                }
                if cpu.shares.map_or(false, |s| s <= 0) {
                    return Err(format!("Group {}: shares must be > 0", name));
                }
            }
        }

        Ok(())
    }

    /// Hierarchy to use: discovered from /proc/mounts or as configured
    pub fn resolve_hierarchy(&self) -> Result<Hierarchy> {
        if self.hierarchy.discover {
            let discovered =
                Hierarchy::discover().context("Failed to discover cgroup mounts")?;
            Ok(discovered.with_membership_file(self.hierarchy.mounts.membership_file))
        } else {
            Ok(self.hierarchy.mounts.clone())
        }
    }
}

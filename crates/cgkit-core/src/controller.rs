//! Controllers and their tunable tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CgroupError;

/// A cgroup v1 controller (subsystem) handled by cgkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Controller {
    /// CPU bandwidth and shares
    Cpu,
    /// CPU core and memory node pinning
    Cpuset,
    /// Per-device block I/O throttling
    Blkio,
}

impl Controller {
    pub const ALL: [Controller; 3] = [Controller::Cpu, Controller::Cpuset, Controller::Blkio];

    /// Subsystem name, also the prefix of every tunable file
    pub fn name(self) -> &'static str {
        match self {
            Controller::Cpu => "cpu",
            Controller::Cpuset => "cpuset",
            Controller::Blkio => "blkio",
        }
    }

    /// Conventional mount point on a cgroup v1 host
    pub fn default_mount_root(self) -> PathBuf {
        PathBuf::from("/sys/fs/cgroup").join(self.name())
    }

    /// Tunables owned by this controller
    pub fn tunables(self) -> &'static [Tunable] {
        match self {
            Controller::Cpu => &[Tunable::CfsQuotaUs, Tunable::CfsPeriodUs, Tunable::Shares],
            Controller::Cpuset => &[Tunable::Cpus, Tunable::Mems],
            Controller::Blkio => &[
                Tunable::ThrottleReadBpsDevice,
                Tunable::ThrottleWriteBpsDevice,
                Tunable::ThrottleReadIopsDevice,
                Tunable::ThrottleWriteIopsDevice,
            ],
        }
    }

    /// Whether `tunable` belongs to this controller
    pub fn owns(self, tunable: Tunable) -> bool {
        tunable.controller() == self
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Controller {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Controller::Cpu),
            "cpuset" => Ok(Controller::Cpuset),
            "blkio" => Ok(Controller::Blkio),
            other => Err(format!(
                "unknown controller {:?} (expected cpu, cpuset or blkio)",
                other
            )),
        }
    }
}

/// Shape of the value a tunable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Signed decimal integer
    Integer,
    /// CPU or memory node list such as `0-2,5`
    IdRange,
    /// `MAJOR:MINOR RATE` throttle rule
    DeviceRate,
}

/// A controller-scoped setting backed by a pseudo-file in the group directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tunable {
    CfsQuotaUs,
    CfsPeriodUs,
    Shares,
    Cpus,
    Mems,
    ThrottleReadBpsDevice,
    ThrottleWriteBpsDevice,
    ThrottleReadIopsDevice,
    ThrottleWriteIopsDevice,
}

impl Tunable {
    pub const ALL: [Tunable; 9] = [
        Tunable::CfsQuotaUs,
        Tunable::CfsPeriodUs,
        Tunable::Shares,
        Tunable::Cpus,
        Tunable::Mems,
        Tunable::ThrottleReadBpsDevice,
        Tunable::ThrottleWriteBpsDevice,
        Tunable::ThrottleReadIopsDevice,
        Tunable::ThrottleWriteIopsDevice,
    ];

    /// Owning controller
    pub fn controller(self) -> Controller {
        match self {
            Tunable::CfsQuotaUs | Tunable::CfsPeriodUs | Tunable::Shares => Controller::Cpu,
            Tunable::Cpus | Tunable::Mems => Controller::Cpuset,
            Tunable::ThrottleReadBpsDevice
            | Tunable::ThrottleWriteBpsDevice
            | Tunable::ThrottleReadIopsDevice
            | Tunable::ThrottleWriteIopsDevice => Controller::Blkio,
        }
    }

    /// Name as the kernel spells it after the controller prefix
    pub fn name(self) -> &'static str {
        match self {
            Tunable::CfsQuotaUs => "cfs_quota_us",
            Tunable::CfsPeriodUs => "cfs_period_us",
            Tunable::Shares => "shares",
            Tunable::Cpus => "cpus",
            Tunable::Mems => "mems",
            Tunable::ThrottleReadBpsDevice => "throttle.read_bps_device",
            Tunable::ThrottleWriteBpsDevice => "throttle.write_bps_device",
            Tunable::ThrottleReadIopsDevice => "throttle.read_iops_device",
            Tunable::ThrottleWriteIopsDevice => "throttle.write_iops_device",
        }
    }

    /// File name inside a group directory, e.g. `cpu.cfs_quota_us`
    pub fn file_name(self) -> String {
        format!("{}.{}", self.controller().name(), self.name())
    }

    pub fn kind(self) -> ValueKind {
        match self.controller() {
            Controller::Cpu => ValueKind::Integer,
            Controller::Cpuset => ValueKind::IdRange,
            Controller::Blkio => ValueKind::DeviceRate,
        }
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tunable {
    type Err = CgroupError;

    /// Accepts the kernel name (`throttle.read_bps_device`), the
    /// underscore spelling (`throttle_read_bps_device`) or the full file
    /// name (`blkio.throttle.read_bps_device`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tunable::ALL
            .iter()
            .copied()
            .find(|t| {
                t.name() == wanted
                    || t.name().replace('.', "_") == wanted
                    || t.file_name() == wanted
            })
            .ok_or_else(|| CgroupError::ParseError {
                tunable: "tunable name".to_string(),
                content: wanted.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunable_tables_are_disjoint() {
        for controller in Controller::ALL {
            for tunable in controller.tunables() {
                assert_eq!(tunable.controller(), controller);
                assert!(controller.owns(*tunable));
            }
        }
        let total: usize = Controller::ALL.iter().map(|c| c.tunables().len()).sum();
        assert_eq!(total, Tunable::ALL.len());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Tunable::CfsQuotaUs.file_name(), "cpu.cfs_quota_us");
        assert_eq!(Tunable::Shares.file_name(), "cpu.shares");
        assert_eq!(Tunable::Cpus.file_name(), "cpuset.cpus");
        assert_eq!(
            Tunable::ThrottleReadBpsDevice.file_name(),
            "blkio.throttle.read_bps_device"
        );
    }

    #[test]
    fn test_tunable_from_str_spellings() {
        assert_eq!(
            "throttle_write_iops_device".parse::<Tunable>().unwrap(),
            Tunable::ThrottleWriteIopsDevice
        );
        assert_eq!(
            "throttle.write_iops_device".parse::<Tunable>().unwrap(),
            Tunable::ThrottleWriteIopsDevice
        );
        assert_eq!("cpuset.mems".parse::<Tunable>().unwrap(), Tunable::Mems);
        assert!("memory.limit_in_bytes".parse::<Tunable>().is_err());
    }

    #[test]
    fn test_controller_from_str() {
        assert_eq!("CPU".parse::<Controller>().unwrap(), Controller::Cpu);
        assert_eq!("blkio".parse::<Controller>().unwrap(), Controller::Blkio);
        assert!("memory".parse::<Controller>().is_err());
    }

    #[test]
    fn test_default_mount_roots() {
        assert_eq!(
            Controller::Cpuset.default_mount_root(),
            PathBuf::from("/sys/fs/cgroup/cpuset")
        );
    }

    #[test]
    fn test_controller_serde() {
        let json = serde_json::to_string(&Controller::Cpuset).unwrap();
        assert_eq!(json, r#""cpuset""#);
        let tunable: Tunable = serde_json::from_str(r#""cfs_quota_us""#).unwrap();
        assert_eq!(tunable, Tunable::CfsQuotaUs);
    }
}

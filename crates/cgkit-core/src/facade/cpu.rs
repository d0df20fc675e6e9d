use crate::codec::Value;
use crate::controller::{Controller, Tunable};
use crate::error::Result;
use crate::group::Group;
use crate::hierarchy::Hierarchy;

use super::CgroupHandle;

/// CPU bandwidth and shares of one group
#[derive(Debug, Clone)]
pub struct Cpu {
    group: Group,
}

impl Cpu {
    /// Bind `name` under the default cpu mount root
    pub fn new(name: &str) -> Result<Self> {
        Self::with_hierarchy(&Hierarchy::default(), name)
    }

    pub fn with_hierarchy(hierarchy: &Hierarchy, name: &str) -> Result<Self> {
        Ok(Self {
            group: Group::new(hierarchy, Controller::Cpu, name)?,
        })
    }

    /// Stage `cpu.cfs_quota_us` (`-1` removes the limit)
    pub fn set_cfs_quota_us(&mut self, quota_us: i64) -> Result<&mut Self> {
        self.stage(Tunable::CfsQuotaUs, quota_us)
    }

    /// Same as [`Cpu::set_cfs_quota_us`]
    pub fn set_rate(&mut self, quota_us: i64) -> Result<&mut Self> {
        self.set_cfs_quota_us(quota_us)
    }

    pub fn set_cfs_period_us(&mut self, period_us: i64) -> Result<&mut Self> {
        self.stage(Tunable::CfsPeriodUs, period_us)
    }

    pub fn set_shares(&mut self, shares: i64) -> Result<&mut Self> {
        self.stage(Tunable::Shares, shares)
    }

    pub fn cfs_quota_us(&self) -> Result<Option<i64>> {
        self.current(Tunable::CfsQuotaUs)
    }

    pub fn cfs_period_us(&self) -> Result<Option<i64>> {
        self.current(Tunable::CfsPeriodUs)
    }

    pub fn shares(&self) -> Result<Option<i64>> {
        self.current(Tunable::Shares)
    }

    fn stage(&mut self, tunable: Tunable, value: i64) -> Result<&mut Self> {
        self.group.stage(tunable, Value::Int(value))?;
        Ok(self)
    }

    fn current(&self, tunable: Tunable) -> Result<Option<i64>> {
        Ok(self
            .group
            .current(tunable)?
            .and_then(|value| value.as_int()))
    }
}

impl CgroupHandle for Cpu {
    fn group(&self) -> &Group {
        &self.group
    }

    fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CgroupError;

    #[test]
    fn test_setters_only_stage() {
        let dir = tempfile::tempdir().unwrap();
        let hierarchy = Hierarchy::under(dir.path());
        let mut cpu = Cpu::with_hierarchy(&hierarchy, "test").unwrap();

        cpu.set_cfs_quota_us(30000).unwrap().set_shares(2048).unwrap();

        assert!(!cpu.exists());
        assert_eq!(cpu.group().pending().len(), 2);
        assert_eq!(cpu.cfs_quota_us().unwrap(), Some(30000));
        assert_eq!(cpu.shares().unwrap(), Some(2048));
        assert_eq!(cpu.cfs_period_us().unwrap(), None);
    }

    #[test]
    fn test_rate_alias() {
        let mut cpu = Cpu::new("test").unwrap();
        cpu.set_rate(50000).unwrap();
        assert_eq!(cpu.cfs_quota_us().unwrap(), Some(50000));
    }

    #[test]
    fn test_setters_reject_out_of_range() {
        let mut cpu = Cpu::new("test").unwrap();

        assert!(matches!(
            cpu.set_shares(0),
            Err(CgroupError::ValueOutOfRange { .. })
        ));
        assert!(cpu.set_cfs_period_us(-5).is_err());
        assert!(!cpu.group().has_pending());

        cpu.set_cfs_quota_us(-1).unwrap();
        assert_eq!(cpu.cfs_quota_us().unwrap(), Some(-1));
    }

    #[test]
    fn test_default_mount_root() {
        let cpu = Cpu::new("/test").unwrap();
        assert_eq!(
            cpu.group().path(),
            std::path::PathBuf::from("/sys/fs/cgroup/cpu/test")
        );
    }
}

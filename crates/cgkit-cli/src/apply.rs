//! Create-or-modify the groups listed in the configuration

use anyhow::{Context, Result};
use cgkit_core::{Blkio, CgroupHandle, Controller, Cpu, Cpuset, Hierarchy, Tunable};
use std::fmt;
use tracing::info;

use crate::config::{BlkioConfig, CpuConfig, CpusetConfig, GroupConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Modified,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Created => write!(f, "created"),
            Action::Modified => write!(f, "modified"),
        }
    }
}

/// What `apply` did to one controller's group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub controller: Controller,
    pub group: String,
    pub action: Action,
}

/// Apply every group in order, stopping at the first failure
pub fn apply_groups(hierarchy: &Hierarchy, groups: &[GroupConfig]) -> Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();

    for group in groups {
        if let Some(cpu) = &group.cpu {
            let action = apply_cpu(hierarchy, &group.name, cpu)
                .with_context(|| format!("Failed to apply cpu group {}", group.name))?;
            outcomes.push(outcome(Controller::Cpu, &group.name, action));
        }

        if let Some(cpuset) = &group.cpuset {
            let action = apply_cpuset(hierarchy, &group.name, cpuset)
                .with_context(|| format!("Failed to apply cpuset group {}", group.name))?;
            outcomes.push(outcome(Controller::Cpuset, &group.name, action));
        }

        if let Some(blkio) = &group.blkio {
            let action = apply_blkio(hierarchy, &group.name, blkio)
                .with_context(|| format!("Failed to apply blkio group {}", group.name))?;
            outcomes.push(outcome(Controller::Blkio, &group.name, action));
        }
    }

    info!(count = outcomes.len(), "Applied configured groups");
    Ok(outcomes)
}

fn outcome(controller: Controller, group: &str, action: Action) -> Outcome {
    Outcome {
        controller,
        group: group.to_string(),
        action,
    }
}

fn apply_cpu(hierarchy: &Hierarchy, name: &str, config: &CpuConfig) -> cgkit_core::Result<Action> {
    let mut cpu = Cpu::with_hierarchy(hierarchy, name)?;

    if let Some(period) = config.cfs_period_us {
        cpu.set_cfs_period_us(period)?;
    }
    if let Some(quota) = config.cfs_quota_us {
        cpu.set_cfs_quota_us(quota)?;
    }
    if let Some(shares) = config.shares {
        cpu.set_shares(shares)?;
    }

    commit(&mut cpu)
}

fn apply_cpuset(
    hierarchy: &Hierarchy,
    name: &str,
    config: &CpusetConfig,
) -> cgkit_core::Result<Action> {
    let mut cpuset = Cpuset::with_hierarchy(hierarchy, name)?;

    // the kernel refuses tasks until both are set, cpus first
    if let Some(cpus) = &config.cpus {
        cpuset.set_cpus(cpus.as_str())?;
    }
    if let Some(mems) = &config.mems {
        cpuset.set_mems(mems.as_str())?;
    }

    commit(&mut cpuset)
}

fn apply_blkio(
    hierarchy: &Hierarchy,
    name: &str,
    config: &BlkioConfig,
) -> cgkit_core::Result<Action> {
    let mut blkio = Blkio::with_hierarchy(hierarchy, name)?;

    let rules = [
        (Tunable::ThrottleReadBpsDevice, &config.throttle_read_bps_device),
        (Tunable::ThrottleWriteBpsDevice, &config.throttle_write_bps_device),
        (Tunable::ThrottleReadIopsDevice, &config.throttle_read_iops_device),
        (Tunable::ThrottleWriteIopsDevice, &config.throttle_write_iops_device),
    ];
    for (tunable, list) in rules {
        for rule in list {
            blkio.set_throttle(tunable, rule.clone())?;
        }
    }

    commit(&mut blkio)
}

fn commit(handle: &mut impl CgroupHandle) -> cgkit_core::Result<Action> {
    if handle.exists() {
        handle.modify()?;
        Ok(Action::Modified)
    } else {
        handle.create()?;
        Ok(Action::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn fake_hierarchy() -> (TempDir, Hierarchy) {
        let dir = tempfile::tempdir().unwrap();
        let hierarchy = Hierarchy::under(dir.path());
        for controller in Controller::ALL {
            fs::create_dir_all(hierarchy.mount_root(controller)).unwrap();
        }
        (dir, hierarchy)
    }

    fn parse(toml_str: &str) -> Vec<GroupConfig> {
        let config: Config = toml::from_str(toml_str).unwrap();
        config.groups
    }

    #[test]
    fn test_apply_creates_then_modifies() {
        let (_dir, hierarchy) = fake_hierarchy();
        let groups = Config::example().groups;

        let first = apply_groups(&hierarchy, &groups).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].action, Action::Created);

        let quota = hierarchy.cpu.join("cgkit/example/cpu.cfs_quota_us");
        assert_eq!(fs::read_to_string(&quota).unwrap(), "30000");

        let second = apply_groups(&hierarchy, &groups).unwrap();
        assert_eq!(second[0].action, Action::Modified);
    }

    #[test]
    fn test_apply_all_controllers() {
        let (_dir, hierarchy) = fake_hierarchy();
        let groups = parse(
            r#"
            [[groups]]
            name = "db"
            [groups.cpu]
            shares = 512
            [groups.cpuset]
            cpus = "0-1"
            mems = "0"
            [groups.blkio]
            throttle_write_bps_device = ["8:0 1000", "8:16 2000"]
            "#,
        );

        let outcomes = apply_groups(&hierarchy, &groups).unwrap();
        let controllers: Vec<_> = outcomes.iter().map(|o| o.controller).collect();
        assert_eq!(
            controllers,
            vec![Controller::Cpu, Controller::Cpuset, Controller::Blkio]
        );

        let shares = hierarchy.cpu.join("db/cpu.shares");
        assert_eq!(fs::read_to_string(shares).unwrap(), "512");
        let cpus = hierarchy.cpuset.join("db/cpuset.cpus");
        assert_eq!(fs::read_to_string(cpus).unwrap(), "0-1");
        // fake files keep only the last rule written
        let bps = hierarchy.blkio.join("db/blkio.throttle.write_bps_device");
        assert_eq!(fs::read_to_string(bps).unwrap(), "8:16 2000");
    }

    #[test]
    fn test_apply_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let hierarchy = Hierarchy::under(dir.path());
        let groups = Config::example().groups;

        let err = apply_groups(&hierarchy, &groups).unwrap_err();
        assert!(err.to_string().contains("cgkit/example"));
        assert!(err
            .chain()
            .any(|cause| matches!(
                cause.downcast_ref::<cgkit_core::CgroupError>(),
                Some(cgkit_core::CgroupError::RootGroupMissing { .. })
            )));
        assert!(!hierarchy.cpu.exists());
    }

    #[test]
    fn test_apply_rejects_out_of_range_shares() {
        let (_dir, hierarchy) = fake_hierarchy();
        let groups = parse(
            r#"
            [[groups]]
            name = "bad"
            [groups.cpu]
            shares = 0
            "#,
        );

        assert!(apply_groups(&hierarchy, &groups).is_err());
        assert!(!hierarchy.cpu.join("bad").exists());
    }
}

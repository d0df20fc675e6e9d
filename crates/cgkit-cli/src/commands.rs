//! Argument parsing and error classification shared by the `cgkit` commands

use cgkit_core::{CgroupError, Controller, Group, GroupName, Tunable};

/// Exit status for success
pub const EXIT_OK: u8 = 0;
/// Exit status for filesystem and kernel failures
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for rejected input, matching clap's usage errors
pub const EXIT_USAGE: u8 = 2;

/// One `--set tunable=value` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub tunable: Tunable,
    pub value: String,
}

/// Parse `tunable=value`; the tunable may be written as `cfs_quota_us`,
/// `throttle.read_bps_device` or the full file name.
pub fn parse_assignment(arg: &str) -> Result<Assignment, String> {
    let (tunable, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected TUNABLE=VALUE, got '{}'", arg))?;

    let tunable: Tunable = tunable.trim().parse().map_err(|e: CgroupError| e.to_string())?;

    Ok(Assignment {
        tunable,
        value: value.trim().to_string(),
    })
}

/// One `-g controller:group` argument of `cgkit exec`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub controller: Controller,
    pub name: GroupName,
}

pub fn parse_group_spec(arg: &str) -> Result<GroupSpec, String> {
    let (controller, name) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected CONTROLLER:GROUP, got '{}'", arg))?;

    Ok(GroupSpec {
        controller: controller.parse()?,
        name: name.parse().map_err(|e: CgroupError| e.to_string())?,
    })
}

/// Stage every assignment on `group`, stopping at the first invalid one
pub fn stage_assignments(group: &mut Group, assignments: &[Assignment]) -> cgkit_core::Result<()> {
    for assignment in assignments {
        group.stage_str(assignment.tunable, &assignment.value)?;
    }
    Ok(())
}

/// Map an error to the process exit status
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let cgroup_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<CgroupError>());

    match cgroup_error {
        Some(e) if e.is_validation() => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use cgkit_core::{Hierarchy, Value};

    #[test]
    fn test_parse_assignment() {
        let a = parse_assignment("cfs_quota_us=30000").unwrap();
        assert_eq!(a.tunable, Tunable::CfsQuotaUs);
        assert_eq!(a.value, "30000");

        let a = parse_assignment("blkio.throttle.read_bps_device=8:0 1000").unwrap();
        assert_eq!(a.tunable, Tunable::ThrottleReadBpsDevice);
        assert_eq!(a.value, "8:0 1000");
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert!(parse_assignment("cfs_quota_us").is_err());
        assert!(parse_assignment("memory.limit=1").is_err());
    }

    #[test]
    fn test_parse_group_spec() {
        let spec = parse_group_spec("cpuset:apache/worker").unwrap();
        assert_eq!(spec.controller, Controller::Cpuset);
        assert_eq!(spec.name.to_string(), "apache/worker");

        assert!(parse_group_spec("apache").is_err());
        assert!(parse_group_spec("memory:apache").is_err());
        assert!(parse_group_spec("cpu:../up").is_err());
    }

    #[test]
    fn test_stage_assignments() {
        let mut group = Group::new(&Hierarchy::default(), Controller::Cpu, "test").unwrap();
        let assignments = vec![
            parse_assignment("shares=512").unwrap(),
            parse_assignment("cfs_quota_us=-1").unwrap(),
        ];

        stage_assignments(&mut group, &assignments).unwrap();
        assert_eq!(group.staged(Tunable::Shares), Some(&Value::Int(512)));
        assert_eq!(group.pending().len(), 2);
    }

    #[test]
    fn test_stage_assignments_foreign_tunable() {
        let mut group = Group::new(&Hierarchy::default(), Controller::Cpu, "test").unwrap();
        let assignments = vec![parse_assignment("cpus=0-1").unwrap()];

        let err = stage_assignments(&mut group, &assignments).unwrap_err();
        assert!(matches!(err, CgroupError::UnsupportedTunable { .. }));
    }

    #[test]
    fn test_exit_code() {
        let usage: anyhow::Error = CgroupError::InvalidRange("0--1".to_string()).into();
        assert_eq!(exit_code(&usage), EXIT_USAGE);

        let wrapped = Err::<(), _>(CgroupError::NotFound {
            controller: Controller::Cpu,
            group: "test".to_string(),
        })
        .context("Failed to modify")
        .unwrap_err();
        assert_eq!(exit_code(&wrapped), EXIT_FAILURE);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), EXIT_FAILURE);
    }
}

//! Integration tests: configuration file driving `apply` against a fake hierarchy

use cgkit_cli::{apply_groups, Action, Config};
use cgkit_core::{CgroupHandle, Controller, Cpu, MembershipFile};
use std::fs;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let root = dir.join("mnt");
    for controller in Controller::ALL {
        fs::create_dir_all(root.join(controller.name())).unwrap();
    }

    let content = format!(
        r#"
[hierarchy]
cpu = "{root}/cpu"
cpuset = "{root}/cpuset"
blkio = "{root}/blkio"
membership_file = "cgroup.procs"

[[groups]]
name = "web/frontend"

[groups.cpu]
cfs_period_us = 100000
cfs_quota_us = 50000

[groups.cpuset]
cpus = "0"
mems = "0"

[[groups]]
name = "batch"

[groups.blkio]
throttle_read_iops_device = ["8:0 500"]
"#,
        root = root.display()
    );

    let path = dir.join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_apply_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    let config = Config::load_from_file(&path).unwrap();
    config.validate().unwrap();

    let hierarchy = config.resolve_hierarchy().unwrap();
    assert_eq!(hierarchy.membership_file, MembershipFile::Procs);

    let outcomes = apply_groups(&hierarchy, &config.groups).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.action == Action::Created));

    let quota = hierarchy.cpu.join("web/frontend/cpu.cfs_quota_us");
    assert_eq!(fs::read_to_string(quota).unwrap(), "50000");

    let iops = hierarchy.blkio.join("batch/blkio.throttle.read_iops_device");
    assert_eq!(fs::read_to_string(iops).unwrap(), "8:0 500");
}

#[test]
fn test_apply_updates_existing_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    let mut config = Config::load_from_file(&path).unwrap();
    let hierarchy = config.resolve_hierarchy().unwrap();
    apply_groups(&hierarchy, &config.groups).unwrap();

    if let Some(cpu) = config.groups[0].cpu.as_mut() {
        cpu.cfs_quota_us = Some(25000);
    }
    let outcomes = apply_groups(&hierarchy, &config.groups).unwrap();
    assert_eq!(outcomes[0].action, Action::Modified);

    let cpu = Cpu::with_hierarchy(&hierarchy, "web/frontend").unwrap();
    assert!(cpu.exists());
    assert_eq!(cpu.cfs_quota_us().unwrap(), Some(25000));
}

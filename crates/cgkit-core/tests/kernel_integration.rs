// Integration tests against a real cgroup v1 hierarchy.
// They need root and the cpu/cpuset/blkio controllers mounted under
// /sys/fs/cgroup, so they are marked #[ignore].

use cgkit_core::{Blkio, CgroupHandle, Controller, Cpu, Cpuset, Hierarchy};

fn mounted_hierarchy() -> Option<Hierarchy> {
    let hierarchy = Hierarchy::discover().ok()?;
    Controller::ALL
        .iter()
        .all(|c| hierarchy.is_mounted(*c))
        .then_some(hierarchy)
}

#[test]
#[ignore] // Requires root and cgroup v1
fn test_cpu_quota_round_trip_real() {
    let Some(hierarchy) = mounted_hierarchy() else {
        println!("cgroup v1 controllers not mounted, skipping");
        return;
    };

    let mut cpu = Cpu::with_hierarchy(&hierarchy, "cgkit-test-cpu").unwrap();
    if cpu.exists() {
        cpu.delete().unwrap();
    }

    cpu.set_cfs_quota_us(30000).unwrap();
    cpu.create().unwrap();
    assert_eq!(cpu.cfs_quota_us().unwrap(), Some(30000));

    cpu.attach().unwrap();
    cpu.detach().unwrap();
    cpu.delete().unwrap();
    assert!(!cpu.exists());
}

#[test]
#[ignore] // Requires root and cgroup v1
fn test_cpuset_pinning_real() {
    let Some(hierarchy) = mounted_hierarchy() else {
        println!("cgroup v1 controllers not mounted, skipping");
        return;
    };

    let mut core = Cpuset::with_hierarchy(&hierarchy, "cgkit-test-cpuset").unwrap();
    core.set_cpus("0").unwrap().set_mems("0").unwrap();
    core.create().unwrap();
    core.attach().unwrap();
    core.detach().unwrap();
    core.delete().unwrap();
}

#[test]
#[ignore] // Requires root, cgroup v1 and a block device 8:0
fn test_blkio_throttle_real() {
    let Some(hierarchy) = mounted_hierarchy() else {
        println!("cgroup v1 controllers not mounted, skipping");
        return;
    };

    let mut io = Blkio::with_hierarchy(&hierarchy, "cgkit-test-blkio").unwrap();
    io.set_throttle_write_bps_device("8:0 100000000").unwrap();
    io.create().unwrap();
    io.delete().unwrap();
}

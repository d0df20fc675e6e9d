//! cgkit Core Library
//!
//! Management of cgroup v1 groups for the CPU, CPUSET and BLKIO controllers:
//! create, modify and delete a group, attach and detach processes, and read
//! or write controller tunables through the cgroup virtual filesystem.
//!
//! Everything is synchronous and unlocked. The filesystem is the source of
//! truth, so existence is re-checked before every operation and may still
//! change under a concurrent caller.

pub mod codec;
pub mod controller;
pub mod error;
pub mod facade;
pub mod group;
pub mod hierarchy;
pub mod path;
mod utils;

pub use codec::{DeviceId, DeviceRate, IdRange, Value};
pub use controller::{Controller, Tunable, ValueKind};
pub use error::{CgroupError, Result};
pub use facade::{Blkio, CgroupHandle, Cpu, Cpuset};
pub use group::{Group, StagedAttribute};
pub use hierarchy::{Hierarchy, MembershipFile};
pub use path::GroupName;

pub use nix::unistd::Pid;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

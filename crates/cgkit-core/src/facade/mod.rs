//! Controller facades: CPU, CPUSET and BLKIO groups
//!
//! Each facade owns a [`Group`] of its controller and only exposes setters
//! for that controller's tunables. The lifecycle and membership surface is
//! shared through [`CgroupHandle`].
//!
//! ```no_run
//! use cgkit_core::{CgroupHandle, Cpu};
//!
//! let mut cpu = Cpu::new("test")?;
//! if !cpu.exists() {
//!     cpu.set_cfs_quota_us(30000)?;
//!     cpu.create()?;
//! }
//! cpu.attach()?;
//! // ... work limited to 30% of a core ...
//! cpu.detach()?;
//! cpu.delete()?;
//! # Ok::<(), cgkit_core::CgroupError>(())
//! ```

mod blkio;
mod cpu;
mod cpuset;

pub use blkio::Blkio;
pub use cpu::Cpu;
pub use cpuset::Cpuset;

use nix::unistd::Pid;

use crate::error::Result;
use crate::group::Group;

/// Lifecycle and membership operations shared by every facade
pub trait CgroupHandle {
    fn group(&self) -> &Group;

    fn group_mut(&mut self) -> &mut Group;

    fn exists(&self) -> bool {
        self.group().exists()
    }

    fn create(&mut self) -> Result<()> {
        self.group_mut().create()
    }

    /// Alias of [`CgroupHandle::create`]
    fn open(&mut self) -> Result<()> {
        self.create()
    }

    fn modify(&mut self) -> Result<()> {
        self.group_mut().modify()
    }

    fn delete(&self) -> Result<()> {
        self.group().delete()
    }

    /// Alias of [`CgroupHandle::delete`]
    fn close(&self) -> Result<()> {
        self.delete()
    }

    /// Attach the calling process
    fn attach(&self) -> Result<()> {
        self.group().attach()
    }

    fn attach_pid(&self, pid: Pid) -> Result<()> {
        self.group().attach_pid(pid)
    }

    /// Move the calling process back to the root group
    fn detach(&self) -> Result<()> {
        self.group().detach()
    }

    fn detach_pid(&self, pid: Pid) -> Result<()> {
        self.group().detach_pid(pid)
    }

    fn members(&self) -> Result<Vec<Pid>> {
        self.group().members()
    }
}

//! Controller mount roots and membership file selection

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::controller::Controller;
use crate::error::Result;
use crate::utils::read_cgroup_file;

const PROC_MOUNTS: &str = "/proc/mounts";

/// File a PID is written to when attaching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MembershipFile {
    /// `tasks`: moves a single thread
    #[default]
    #[serde(rename = "tasks")]
    Tasks,
    /// `cgroup.procs`: moves the whole thread group
    #[serde(rename = "cgroup.procs")]
    Procs,
}

impl MembershipFile {
    pub fn file_name(self) -> &'static str {
        match self {
            MembershipFile::Tasks => "tasks",
            MembershipFile::Procs => "cgroup.procs",
        }
    }
}

/// Where each controller hierarchy is mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// Mount root of the cpu controller
    #[serde(default = "default_cpu_root")]
    pub cpu: PathBuf,

    /// Mount root of the cpuset controller
    #[serde(default = "default_cpuset_root")]
    pub cpuset: PathBuf,

    /// Mount root of the blkio controller
    #[serde(default = "default_blkio_root")]
    pub blkio: PathBuf,

    /// Membership file written by attach/detach
    #[serde(default)]
    pub membership_file: MembershipFile,
}

fn default_cpu_root() -> PathBuf {
    Controller::Cpu.default_mount_root()
}

fn default_cpuset_root() -> PathBuf {
    Controller::Cpuset.default_mount_root()
}

fn default_blkio_root() -> PathBuf {
    Controller::Blkio.default_mount_root()
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self {
            cpu: default_cpu_root(),
            cpuset: default_cpuset_root(),
            blkio: default_blkio_root(),
            membership_file: MembershipFile::default(),
        }
    }
}

impl Hierarchy {
    /// All controllers mounted as `<base>/<controller>`
    pub fn under(base: &Path) -> Self {
        Self {
            cpu: base.join(Controller::Cpu.name()),
            cpuset: base.join(Controller::Cpuset.name()),
            blkio: base.join(Controller::Blkio.name()),
            membership_file: MembershipFile::default(),
        }
    }

    pub fn mount_root(&self, controller: Controller) -> &Path {
        match controller {
            Controller::Cpu => &self.cpu,
            Controller::Cpuset => &self.cpuset,
            Controller::Blkio => &self.blkio,
        }
    }

    pub fn with_mount_root(mut self, controller: Controller, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match controller {
            Controller::Cpu => self.cpu = root,
            Controller::Cpuset => self.cpuset = root,
            Controller::Blkio => self.blkio = root,
        }
        self
    }

    pub fn with_membership_file(mut self, membership_file: MembershipFile) -> Self {
        self.membership_file = membership_file;
        self
    }

    /// Whether the controller's root group directory is present
    pub fn is_mounted(&self, controller: Controller) -> bool {
        self.mount_root(controller).is_dir()
    }

    /// Locate cgroup v1 mount points from `/proc/mounts`.
    ///
    /// Controllers without a mount entry keep their default root.
    pub fn discover() -> Result<Self> {
        let content = read_cgroup_file(Path::new(PROC_MOUNTS))?;
        Ok(Self::from_mounts(&content))
    }

    /// Build a hierarchy from `/proc/mounts` content
    pub fn from_mounts(content: &str) -> Self {
        let mut hierarchy = Self::default();

        for controller in Controller::ALL {
            if let Some(mount_point) = find_mount_point_in(content, controller) {
                debug!(
                    controller = %controller,
                    mount_point = %mount_point.display(),
                    "Found cgroup v1 mount"
                );
                hierarchy = hierarchy.with_mount_root(controller, mount_point);
            }
        }

        hierarchy
    }
}

/// Find the mount point of `controller` in `/proc/mounts` content.
///
/// Format: `device mount_point fs_type options dump pass`. Co-mounted
/// controllers (`cpu,cpuacct`) list every subsystem in the options.
fn find_mount_point_in(content: &str, controller: Controller) -> Option<PathBuf> {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(_device), Some(mount_point), Some(fs_type), Some(options)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if fs_type != "cgroup" {
            continue;
        }

        if options.split(',').any(|opt| opt == controller.name()) {
            return Some(PathBuf::from(unescape_mount_field(mount_point)));
        }
    }

    None
}

/// Undo the octal escaping the kernel applies to spaces and tabs
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\134", "\\")
}

//! Group lifecycle and membership
//!
//! A [`Group`] is a staged view of one cgroup directory. Setters only touch
//! the pending attribute list; [`Group::create`] and [`Group::modify`] are
//! the only calls that write tunables.
//!
//! Writes are not transactional. If a tunable write fails halfway through a
//! flush, the directory and the tunables already written stay in place and
//! the pending list is kept intact. Undoing a partial create is up to the
//! caller (usually a [`Group::delete`]).

use nix::unistd::{getpid, Pid};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::codec::{decode, decode_device_list, encode, DeviceRate, Value};
use crate::controller::{Controller, Tunable, ValueKind};
use crate::error::{CgroupError, Result};
use crate::hierarchy::{Hierarchy, MembershipFile};
use crate::path::GroupName;
use crate::utils::{has_child_dirs, parse_pid_list, read_cgroup_file, write_cgroup_file};

/// One attribute waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAttribute {
    pub tunable: Tunable,
    pub value: Value,
}

impl StagedAttribute {
    /// Two entries address the same kernel setting: same tunable and, for
    /// device rules, the same device.
    fn same_target(&self, tunable: Tunable, value: &Value) -> bool {
        if self.tunable != tunable {
            return false;
        }
        match (&self.value, value) {
            (Value::Device(a), Value::Device(b)) => a.device == b.device,
            _ => true,
        }
    }
}

/// A named group of one controller
#[derive(Debug, Clone)]
pub struct Group {
    controller: Controller,
    name: GroupName,
    mount_root: PathBuf,
    membership_file: MembershipFile,
    pending: Vec<StagedAttribute>,
}

impl Group {
    /// Bind `name` under the controller's mount root. No filesystem access.
    pub fn new(hierarchy: &Hierarchy, controller: Controller, name: &str) -> Result<Self> {
        Ok(Self::with_name(hierarchy, controller, GroupName::new(name)?))
    }

    pub fn with_name(hierarchy: &Hierarchy, controller: Controller, name: GroupName) -> Self {
        Self {
            controller,
            name,
            mount_root: hierarchy.mount_root(controller).to_path_buf(),
            membership_file: hierarchy.membership_file,
            pending: Vec::new(),
        }
    }

    /// The controller's top-level group
    pub fn root(hierarchy: &Hierarchy, controller: Controller) -> Self {
        Self::with_name(hierarchy, controller, GroupName::root())
    }

    pub fn controller(&self) -> Controller {
        self.controller
    }

    pub fn name(&self) -> &GroupName {
        &self.name
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Absolute path of the group directory
    pub fn path(&self) -> PathBuf {
        self.name.resolve(&self.mount_root)
    }

    fn tunable_path(&self, tunable: Tunable) -> PathBuf {
        self.path().join(tunable.file_name())
    }

    fn group_label(&self) -> String {
        self.name.to_string()
    }

    fn not_found(&self) -> CgroupError {
        CgroupError::NotFound {
            controller: self.controller,
            group: self.group_label(),
        }
    }

    fn root_missing(&self) -> CgroupError {
        CgroupError::RootGroupMissing {
            controller: self.controller,
            root: self.mount_root.clone(),
        }
    }

    fn check_owned(&self, tunable: Tunable) -> Result<()> {
        if self.controller.owns(tunable) {
            Ok(())
        } else {
            Err(CgroupError::UnsupportedTunable {
                controller: self.controller,
                tunable,
            })
        }
    }

    // ----- staging -----

    /// Stage `value` for `tunable`.
    ///
    /// Re-staging the same target replaces the earlier value in place, so
    /// write order follows the order tunables were first set.
    pub fn stage(&mut self, tunable: Tunable, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.check_owned(tunable)?;
        encode(tunable, &value)?;

        match self
            .pending
            .iter_mut()
            .find(|staged| staged.same_target(tunable, &value))
        {
            Some(staged) => staged.value = value,
            None => self.pending.push(StagedAttribute { tunable, value }),
        }
        Ok(self)
    }

    /// Stage a value given as text, decoded for `tunable`
    pub fn stage_str(&mut self, tunable: Tunable, text: &str) -> Result<&mut Self> {
        self.check_owned(tunable)?;
        let value = decode(tunable, text)?;
        self.stage(tunable, value)
    }

    pub fn pending(&self) -> &[StagedAttribute] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop every staged attribute without writing it
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Most recently staged value for a scalar tunable
    pub fn staged(&self, tunable: Tunable) -> Option<&Value> {
        self.pending
            .iter()
            .rev()
            .find(|staged| staged.tunable == tunable)
            .map(|staged| &staged.value)
    }

    /// Every staged rule of a device-rate tunable
    pub fn staged_devices(&self, tunable: Tunable) -> Vec<DeviceRate> {
        self.pending
            .iter()
            .filter(|staged| staged.tunable == tunable)
            .filter_map(|staged| staged.value.as_device().copied())
            .collect()
    }

    // ----- lifecycle -----

    /// Whether the group directory exists right now
    pub fn exists(&self) -> bool {
        self.path().is_dir()
    }

    /// Create the group directory, then write every staged attribute.
    ///
    /// Missing ancestors are created below the mount root. The mount root
    /// itself is never created.
    pub fn create(&mut self) -> Result<()> {
        let path = self.path();

        if !self.mount_root.is_dir() {
            return Err(self.root_missing());
        }

        if path.exists() {
            return Err(CgroupError::AlreadyExists {
                controller: self.controller,
                group: self.group_label(),
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                debug!(parent = %parent.display(), "Creating parent groups");
                fs::create_dir_all(parent).map_err(|e| self.mkdir_error(parent, e))?;
            }
        }

        debug!(path = %path.display(), "Creating cgroup directory");
        fs::create_dir(&path).map_err(|e| self.mkdir_error(&path, e))?;

        info!(
            controller = %self.controller,
            group = %self.name,
            staged = self.pending.len(),
            "Created cgroup"
        );

        self.flush()
    }

    /// Write attributes staged since the last flush to an existing group
    pub fn modify(&mut self) -> Result<()> {
        if !self.exists() {
            return Err(self.not_found());
        }

        self.flush()?;

        info!(controller = %self.controller, group = %self.name, "Modified cgroup");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let path = self.path();

        for staged in &self.pending {
            let file = path.join(staged.tunable.file_name());
            let line = encode(staged.tunable, &staged.value)?;

            debug!(file = %file.display(), value = %line, "Writing tunable");

            if let Err(source) = write_cgroup_file(&file, &line) {
                warn!(
                    controller = %self.controller,
                    group = %self.name,
                    tunable = %staged.tunable,
                    error = %source,
                    "Tunable write failed, group left partially configured"
                );
                return Err(CgroupError::AttributeWriteError {
                    controller: self.controller,
                    group: self.group_label(),
                    tunable: staged.tunable,
                    source,
                });
            }
        }

        self.pending.clear();
        Ok(())
    }

    fn mkdir_error(&self, path: &Path, e: io::Error) -> CgroupError {
        match e.kind() {
            io::ErrorKind::AlreadyExists => CgroupError::AlreadyExists {
                controller: self.controller,
                group: self.group_label(),
            },
            io::ErrorKind::PermissionDenied => {
                CgroupError::PermissionDenied(format!("mkdir {:?}: {}", path, e))
            }
            _ => CgroupError::Io(e),
        }
    }

    /// Remove the group directory. Member tasks must be detached first.
    ///
    /// The root group cannot be removed and always reports `Busy`.
    pub fn delete(&self) -> Result<()> {
        let path = self.path();

        if !self.exists() {
            return Err(self.not_found());
        }

        if self.name.is_root() {
            return Err(CgroupError::Busy {
                controller: self.controller,
                group: self.group_label(),
            });
        }

        debug!(path = %path.display(), "Removing cgroup directory");

        fs::remove_dir(&path).map_err(|e| self.rmdir_error(&path, e))?;

        info!(controller = %self.controller, group = %self.name, "Deleted cgroup");
        Ok(())
    }

    fn rmdir_error(&self, path: &Path, e: io::Error) -> CgroupError {
        let not_empty = || CgroupError::NotEmpty {
            controller: self.controller,
            group: self.group_label(),
        };

        match e.raw_os_error() {
            Some(libc::ENOTEMPTY) => return not_empty(),
            // v1 reports both child groups and live tasks as EBUSY
            Some(libc::EBUSY) if has_child_dirs(path) => return not_empty(),
            Some(libc::EBUSY) => {
                return CgroupError::Busy {
                    controller: self.controller,
                    group: self.group_label(),
                }
            }
            _ => {}
        }

        match e.kind() {
            io::ErrorKind::NotFound => self.not_found(),
            io::ErrorKind::PermissionDenied => {
                CgroupError::PermissionDenied(format!("rmdir {:?}: {}", path, e))
            }
            _ => CgroupError::Io(e),
        }
    }

    // ----- membership -----

    /// Attach the calling process
    pub fn attach(&self) -> Result<()> {
        self.attach_pid(getpid())
    }

    /// Attach `pid` by writing it to the membership file
    pub fn attach_pid(&self, pid: Pid) -> Result<()> {
        if !self.exists() {
            return Err(self.not_found());
        }

        self.write_membership(&self.path(), &self.group_label(), pid)?;

        info!(
            controller = %self.controller,
            group = %self.name,
            pid = pid.as_raw(),
            "Attached process"
        );
        Ok(())
    }

    /// Move the calling process back to the controller's root group
    pub fn detach(&self) -> Result<()> {
        self.detach_pid(getpid())
    }

    /// Move `pid` back to the controller's root group
    pub fn detach_pid(&self, pid: Pid) -> Result<()> {
        let root = GroupName::root();
        let root_path = root.resolve(&self.mount_root);

        if !root_path.is_dir() {
            return Err(self.root_missing());
        }

        self.write_membership(&root_path, &root.to_string(), pid)?;

        info!(
            controller = %self.controller,
            group = %self.name,
            pid = pid.as_raw(),
            "Detached process to root group"
        );
        Ok(())
    }

    fn write_membership(&self, group_path: &Path, group: &str, pid: Pid) -> Result<()> {
        let file = group_path.join(self.membership_file.file_name());

        debug!(file = %file.display(), pid = pid.as_raw(), "Writing membership");

        write_cgroup_file(&file, &pid.as_raw().to_string()).map_err(|source| {
            CgroupError::MembershipWriteError {
                controller: self.controller,
                group: group.to_string(),
                pid: pid.as_raw(),
                source,
            }
        })
    }

    /// PIDs listed in the group's membership file
    pub fn members(&self) -> Result<Vec<Pid>> {
        if !self.exists() {
            return Err(self.not_found());
        }

        let file = self.path().join(self.membership_file.file_name());
        let content = match read_cgroup_file(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_pid_list(self.membership_file.file_name(), &content)?
            .into_iter()
            .map(Pid::from_raw)
            .collect())
    }

    // ----- read-back -----

    /// Raw content of a tunable file
    pub fn read_raw(&self, tunable: Tunable) -> Result<String> {
        self.check_owned(tunable)?;
        if !self.exists() {
            return Err(self.not_found());
        }

        read_cgroup_file(&self.tunable_path(tunable)).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                CgroupError::PermissionDenied(format!("read {}: {}", tunable.file_name(), e))
            } else {
                CgroupError::Io(e)
            }
        })
    }

    /// Committed value of a tunable.
    ///
    /// `None` for a device-rate file without rules and for an id-range file
    /// not set yet (a new cpuset group starts with empty `cpus` and `mems`). A device-rate file with
    /// several rules is a `ParseError`; use [`Group::read_devices`] there.
    pub fn read(&self, tunable: Tunable) -> Result<Option<Value>> {
        let content = self.read_raw(tunable)?;

        if tunable.kind() == ValueKind::DeviceRate {
            let mut rules = decode_device_list(tunable, &content)?;
            return match rules.len() {
                0 => Ok(None),
                1 => Ok(rules.pop().map(Value::Device)),
                _ => Err(CgroupError::ParseError {
                    tunable: tunable.file_name(),
                    content,
                }),
            };
        }

        if tunable.kind() == ValueKind::IdRange && content.trim().is_empty() {
            return Ok(None);
        }

        decode(tunable, &content).map(Some)
    }

    /// Committed rules of a device-rate tunable
    pub fn read_devices(&self, tunable: Tunable) -> Result<Vec<DeviceRate>> {
        let content = self.read_raw(tunable)?;
        decode_device_list(tunable, &content)
    }

    /// Staged value if one is pending, else the committed value if the
    /// group exists, else `None`.
    pub fn current(&self, tunable: Tunable) -> Result<Option<Value>> {
        self.check_owned(tunable)?;

        if let Some(value) = self.staged(tunable) {
            return Ok(Some(value.clone()));
        }

        if self.exists() {
            self.read(tunable)
        } else {
            Ok(None)
        }
    }

    /// Staged rules if any are pending, else the committed rules if the
    /// group exists, else none.
    pub fn current_devices(&self, tunable: Tunable) -> Result<Vec<DeviceRate>> {
        self.check_owned(tunable)?;

        let staged = self.staged_devices(tunable);
        if !staged.is_empty() {
            return Ok(staged);
        }

        if self.exists() {
            self.read_devices(tunable)
        } else {
            Ok(Vec::new())
        }
    }
}

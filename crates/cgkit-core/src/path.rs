//! Group name validation and path resolution under a mount root

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CgroupError, Result};

/// A validated group name relative to a controller mount root.
///
/// Stored as its normalized segments. `"/test"`, `"test/"` and `"test"` are
/// the same group; `"/"` is the root group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupName {
    segments: Vec<String>,
}

impl GroupName {
    pub fn new(name: &str) -> Result<Self> {
        let invalid = |reason: &str| CgroupError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains('\0') {
            return Err(invalid("name contains a NUL byte"));
        }

        let mut segments = Vec::new();
        for segment in name.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(invalid("relative segments would escape the mount root"));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// The implicit top-level group of a controller
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Absolute path of this group under `mount_root`
    pub fn resolve(&self, mount_root: &Path) -> PathBuf {
        let mut path = mount_root.to_path_buf();
        path.extend(&self.segments);
        path
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.segments.join("/"))
        }
    }
}

impl FromStr for GroupName {
    type Err = CgroupError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Resolve `group_name` under `mount_root` in one step
pub fn resolve(mount_root: &Path, group_name: &str) -> Result<PathBuf> {
    Ok(GroupName::new(group_name)?.resolve(mount_root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_simple_and_nested() {
        let root = Path::new("/sys/fs/cgroup/cpu");
        assert_eq!(
            resolve(root, "test").unwrap(),
            PathBuf::from("/sys/fs/cgroup/cpu/test")
        );
        assert_eq!(
            resolve(root, "apache/mod_mruby_group").unwrap(),
            PathBuf::from("/sys/fs/cgroup/cpu/apache/mod_mruby_group")
        );
    }

    #[test]
    fn test_duplicate_separators_are_collapsed() {
        let root = Path::new("/sys/fs/cgroup/cpu");
        assert_eq!(
            resolve(root, "//a///b/").unwrap(),
            PathBuf::from("/sys/fs/cgroup/cpu/a/b")
        );
        assert_eq!(
            GroupName::new("/test").unwrap(),
            GroupName::new("test").unwrap()
        );
    }

    #[test]
    fn test_slash_is_root() {
        let name = GroupName::new("/").unwrap();
        assert!(name.is_root());
        assert_eq!(name, GroupName::root());
        assert_eq!(name.to_string(), "/");
        assert_eq!(
            name.resolve(Path::new("/sys/fs/cgroup/blkio")),
            PathBuf::from("/sys/fs/cgroup/blkio")
        );
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["", "a\0b", "..", "../etc", "a/../../b", "./a"] {
            let err = GroupName::new(bad).unwrap_err();
            assert!(
                matches!(err, CgroupError::InvalidName { .. }),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_display_is_normalized() {
        assert_eq!(GroupName::new("/a//b/").unwrap().to_string(), "a/b");
    }
}

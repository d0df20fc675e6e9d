use crate::codec::IdRange;
use crate::controller::{Controller, Tunable};
use crate::error::Result;
use crate::group::Group;
use crate::hierarchy::Hierarchy;

use super::CgroupHandle;

/// CPU core and memory node pinning of one group.
///
/// The kernel refuses to attach tasks to a cpuset group whose `cpus` or
/// `mems` is empty, so both are normally staged before `create`.
#[derive(Debug, Clone)]
pub struct Cpuset {
    group: Group,
}

impl Cpuset {
    /// Bind `name` under the default cpuset mount root
    pub fn new(name: &str) -> Result<Self> {
        Self::with_hierarchy(&Hierarchy::default(), name)
    }

    pub fn with_hierarchy(hierarchy: &Hierarchy, name: &str) -> Result<Self> {
        Ok(Self {
            group: Group::new(hierarchy, Controller::Cpuset, name)?,
        })
    }

    /// Stage `cpuset.cpus`, e.g. `"0-2,5"`
    pub fn set_cpus(&mut self, cpus: &str) -> Result<&mut Self> {
        self.stage(Tunable::Cpus, cpus)
    }

    /// Stage `cpuset.mems`, e.g. `"0"`
    pub fn set_mems(&mut self, mems: &str) -> Result<&mut Self> {
        self.stage(Tunable::Mems, mems)
    }

    pub fn cpus(&self) -> Result<Option<IdRange>> {
        self.current(Tunable::Cpus)
    }

    pub fn mems(&self) -> Result<Option<IdRange>> {
        self.current(Tunable::Mems)
    }

    fn stage(&mut self, tunable: Tunable, range: &str) -> Result<&mut Self> {
        let range: IdRange = range.parse()?;
        self.group.stage(tunable, range)?;
        Ok(self)
    }

    fn current(&self, tunable: Tunable) -> Result<Option<IdRange>> {
        Ok(self
            .group
            .current(tunable)?
            .and_then(|value| value.as_range().cloned()))
    }
}

impl CgroupHandle for Cpuset {
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
    fn test_set_cpus_and_mems() {
        let mut cpuset = Cpuset::new("test").unwrap();
        cpuset.set_cpus("0-2,5").unwrap().set_mems("0").unwrap();

        assert_eq!(cpuset.cpus().unwrap().unwrap().as_str(), "0-2,5");
        assert_eq!(cpuset.mems().unwrap().unwrap().ids(), vec![0]);
    }

    #[test]
    fn test_invalid_range_is_not_staged() {
        let mut cpuset = Cpuset::new("test").unwrap();
        for bad in ["", "a", "0--2"] {
            assert!(matches!(
                cpuset.set_cpus(bad),
                Err(CgroupError::InvalidRange(_))
            ));
        }
        assert!(!cpuset.group().has_pending());
    }

    #[test]
    fn test_fresh_group_reads_unset() {
        let dir = tempfile::tempdir().unwrap();
        let hierarchy = Hierarchy::under(dir.path());
        std::fs::create_dir_all(&hierarchy.cpuset).unwrap();

        let mut cpuset = Cpuset::with_hierarchy(&hierarchy, "fresh").unwrap();
        cpuset.create().unwrap();
        std::fs::write(cpuset.group().path().join("cpuset.cpus"), "\n").unwrap();
        std::fs::write(cpuset.group().path().join("cpuset.mems"), "\n").unwrap();

        assert_eq!(cpuset.cpus().unwrap(), None);
        assert_eq!(cpuset.mems().unwrap(), None);
    }
}

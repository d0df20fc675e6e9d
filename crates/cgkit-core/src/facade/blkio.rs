use crate::codec::{DeviceRate, Value};
use crate::controller::{Controller, Tunable};
use crate::error::Result;
use crate::group::Group;
use crate::hierarchy::Hierarchy;

use super::CgroupHandle;

/// Per-device block I/O throttling of one group.
///
/// Every throttle tunable takes either a combined `"MAJOR:MINOR RATE"`
/// string or a separate device and rate. Rules for different devices on the
/// same tunable are staged side by side, and each rule is written to the
/// file with its own write call, since the kernel takes one rule per write.
#[derive(Debug, Clone)]
pub struct Blkio {
    group: Group,
}

impl Blkio {
    /// Bind `name` under the default blkio mount root
    pub fn new(name: &str) -> Result<Self> {
        Self::with_hierarchy(&Hierarchy::default(), name)
    }

    pub fn with_hierarchy(hierarchy: &Hierarchy, name: &str) -> Result<Self> {
        Ok(Self {
            group: Group::new(hierarchy, Controller::Blkio, name)?,
        })
    }

    /// Stage a rule on any throttle tunable
    pub fn set_throttle(&mut self, tunable: Tunable, rule: DeviceRate) -> Result<&mut Self> {
        self.group.stage(tunable, Value::Device(rule))?;
        Ok(self)
    }

    fn stage_spec(&mut self, tunable: Tunable, spec: &str) -> Result<&mut Self> {
        self.set_throttle(tunable, spec.parse()?)
    }

    fn stage_parts(&mut self, tunable: Tunable, device: &str, rate: &str) -> Result<&mut Self> {
        self.set_throttle(tunable, DeviceRate::from_parts(device, rate)?)
    }

    /// Stage `blkio.throttle.read_bps_device` from `"MAJOR:MINOR BYTES"`
    pub fn set_throttle_read_bps_device(&mut self, spec: &str) -> Result<&mut Self> {
        self.stage_spec(Tunable::ThrottleReadBpsDevice, spec)
    }

    /// Stage `blkio.throttle.write_bps_device` from `"MAJOR:MINOR BYTES"`
    pub fn set_throttle_write_bps_device(&mut self, spec: &str) -> Result<&mut Self> {
        self.stage_spec(Tunable::ThrottleWriteBpsDevice, spec)
    }

    /// Stage `blkio.throttle.read_iops_device` from `"MAJOR:MINOR OPS"`
    pub fn set_throttle_read_iops_device(&mut self, spec: &str) -> Result<&mut Self> {
        self.stage_spec(Tunable::ThrottleReadIopsDevice, spec)
    }

    /// Stage `blkio.throttle.write_iops_device` from `"MAJOR:MINOR OPS"`
    pub fn set_throttle_write_iops_device(&mut self, spec: &str) -> Result<&mut Self> {
        self.stage_spec(Tunable::ThrottleWriteIopsDevice, spec)
    }

    /// Read bandwidth limit for `device` (`"8:0"`) in bytes/s
    pub fn throttle_read_bps_device(&mut self, device: &str, rate: &str) -> Result<&mut Self> {
        self.stage_parts(Tunable::ThrottleReadBpsDevice, device, rate)
    }

    /// Write bandwidth limit for `device` (`"8:0"`) in bytes/s
    pub fn throttle_write_bps_device(&mut self, device: &str, rate: &str) -> Result<&mut Self> {
        self.stage_parts(Tunable::ThrottleWriteBpsDevice, device, rate)
    }

    /// Read operation limit for `device` (`"8:0"`) in ops/s
    pub fn throttle_read_iops_device(&mut self, device: &str, rate: &str) -> Result<&mut Self> {
        self.stage_parts(Tunable::ThrottleReadIopsDevice, device, rate)
    }

    /// Write operation limit for `device` (`"8:0"`) in ops/s
    pub fn throttle_write_iops_device(&mut self, device: &str, rate: &str) -> Result<&mut Self> {
        self.stage_parts(Tunable::ThrottleWriteIopsDevice, device, rate)
    }

    /// Staged rules of `tunable`, else the committed ones
    pub fn throttle_rules(&self, tunable: Tunable) -> Result<Vec<DeviceRate>> {
        self.group.current_devices(tunable)
    }
}

impl CgroupHandle for Blkio {
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
    fn test_combined_and_split_forms_agree() {
        let mut combined = Blkio::new("io").unwrap();
        combined.set_throttle_write_bps_device("8:0 100000000").unwrap();

        let mut split = Blkio::new("io").unwrap();
        split.throttle_write_bps_device("8:0", "100000000").unwrap();

        assert_eq!(combined.group().pending(), split.group().pending());
        assert_eq!(
            combined
                .throttle_rules(Tunable::ThrottleWriteBpsDevice)
                .unwrap()[0]
                .to_string(),
            "8:0 100000000"
        );
    }

    #[test]
    fn test_invalid_specs() {
        let mut blkio = Blkio::new("io").unwrap();
        assert!(matches!(
            blkio.set_throttle_read_bps_device("8 100000000"),
            Err(CgroupError::InvalidDeviceSpec(_))
        ));
        assert!(matches!(
            blkio.throttle_read_iops_device("8:0", "-5"),
            Err(CgroupError::InvalidDeviceSpec(_))
        ));
        assert!(!blkio.group().has_pending());
    }

    #[test]
    fn test_foreign_tunable_rejected() {
        let mut blkio = Blkio::new("io").unwrap();
        let rule: DeviceRate = "8:0 1".parse().unwrap();
        assert!(matches!(
            blkio.set_throttle(Tunable::Cpus, rule),
            Err(CgroupError::UnsupportedTunable { .. })
        ));
    }
}

//! Attribute codec: typed tunable values to and from kernel text
//!
//! Every write goes through [`encode`], every read-back through [`decode`].
//! The formats are the cgroup v1 ones:
//!
//! ```text
//! cpu.cfs_quota_us                 30000
//! cpuset.cpus                      0-2,5
//! blkio.throttle.write_bps_device  8:0 100000000
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::controller::{Tunable, ValueKind};
use crate::error::{CgroupError, Result};

/// Parse a string made only of ASCII digits.
///
/// `str::parse` alone would also accept a leading `+`.
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A CPU or memory-node list such as `0`, `0-2` or `0-2,5`.
///
/// Kept verbatim so that what is written is exactly what the caller gave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdRange(String);

impl IdRange {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expand to the individual ids, in the order listed
    pub fn ids(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for part in self.0.split(',') {
            match part.split_once('-') {
                Some((start, end)) => {
                    if let (Some(start), Some(end)) =
                        (parse_digits::<u32>(start), parse_digits::<u32>(end))
                    {
                        out.extend(start..=end);
                    }
                }
                None => out.extend(parse_digits::<u32>(part)),
            }
        }
        out
    }
}

impl FromStr for IdRange {
    type Err = CgroupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CgroupError::InvalidRange(s.to_string());

        if s.is_empty() {
            return Err(invalid());
        }

        for part in s.split(',') {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = parse_digits(start).ok_or_else(invalid)?;
                    let end: u32 = parse_digits(end).ok_or_else(invalid)?;
                    if start > end {
                        return Err(invalid());
                    }
                }
                None => {
                    parse_digits::<u32>(part).ok_or_else(invalid)?;
                }
            }
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for IdRange {
    type Error = CgroupError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<IdRange> for String {
    fn from(range: IdRange) -> Self {
        range.0
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block device identifier `MAJOR:MINOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

impl DeviceId {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for DeviceId {
    type Err = CgroupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CgroupError::InvalidDeviceSpec(s.to_string());
        let (major, minor) = s.trim().split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            major: parse_digits(major).ok_or_else(invalid)?,
            minor: parse_digits(minor).ok_or_else(invalid)?,
        })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// One BLKIO throttle rule: bytes/s or ops/s for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceRate {
    pub device: DeviceId,
    pub rate: u64,
}

impl DeviceRate {
    pub fn new(device: DeviceId, rate: u64) -> Self {
        Self { device, rate }
    }

    /// Build from the two-argument form, e.g. `("8:0", "100000000")`
    pub fn from_parts(device: &str, rate: &str) -> Result<Self> {
        let invalid = || CgroupError::InvalidDeviceSpec(format!("{} {}", device, rate));
        let device = device.parse::<DeviceId>().map_err(|_| invalid())?;
        let rate = parse_digits(rate.trim()).ok_or_else(invalid)?;
        Ok(Self { device, rate })
    }
}

impl FromStr for DeviceRate {
    type Err = CgroupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CgroupError::InvalidDeviceSpec(s.to_string());
        let mut fields = s.split_whitespace();
        let (Some(device), Some(rate), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(invalid());
        };
        Self::from_parts(device, rate).map_err(|_| invalid())
    }
}

impl TryFrom<String> for DeviceRate {
    type Error = CgroupError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeviceRate> for String {
    fn from(rate: DeviceRate) -> Self {
        rate.to_string()
    }
}

impl fmt::Display for DeviceRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, self.rate)
    }
}

/// A typed tunable value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Range(IdRange),
    Device(DeviceRate),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Integer,
            Value::Range(_) => ValueKind::IdRange,
            Value::Device(_) => ValueKind::DeviceRate,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&IdRange> {
        match self {
            Value::Range(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&DeviceRate> {
        match self {
            Value::Device(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Range(v) => write!(f, "{}", v),
            Value::Device(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<IdRange> for Value {
    fn from(v: IdRange) -> Self {
        Value::Range(v)
    }
}

impl From<DeviceRate> for Value {
    fn from(v: DeviceRate) -> Self {
        Value::Device(v)
    }
}

/// Error reported when `value` does not fit the domain of `tunable`
fn domain_error(tunable: Tunable, content: &str) -> CgroupError {
    match tunable.kind() {
        ValueKind::Integer => CgroupError::ParseError {
            tunable: tunable.file_name(),
            content: content.to_string(),
        },
        ValueKind::IdRange => CgroupError::InvalidRange(content.to_string()),
        ValueKind::DeviceRate => CgroupError::InvalidDeviceSpec(content.to_string()),
    }
}

/// Kernel-accepted integers: quota is `-1` or positive, period and shares
/// are positive.
fn check_integer(tunable: Tunable, value: i64) -> Result<()> {
    let (ok, expected) = match tunable {
        Tunable::CfsQuotaUs => (value == -1 || value > 0, "-1 or a positive integer"),
        _ => (value > 0, "a positive integer"),
    };

    if ok {
        Ok(())
    } else {
        Err(CgroupError::ValueOutOfRange {
            tunable: tunable.file_name(),
            value,
            expected,
        })
    }
}

/// Encode `value` into the exact line written to the tunable's file
pub fn encode(tunable: Tunable, value: &Value) -> Result<String> {
    if value.kind() != tunable.kind() {
        return Err(domain_error(tunable, &value.to_string()));
    }
    if let Value::Int(v) = value {
        check_integer(tunable, *v)?;
    }
    Ok(value.to_string())
}

/// Decode one value of `tunable` from file content or user input.
///
/// Surrounding whitespace (the kernel's trailing newline) is ignored.
pub fn decode(tunable: Tunable, content: &str) -> Result<Value> {
    let text = content.trim();
    match tunable.kind() {
        ValueKind::Integer => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| domain_error(tunable, text)),
        ValueKind::IdRange => text.parse().map(Value::Range),
        ValueKind::DeviceRate => text.parse().map(Value::Device),
    }
}

/// Decode every rule of a device-rate file, one per line.
///
/// An empty file means no device is throttled.
pub fn decode_device_list(tunable: Tunable, content: &str) -> Result<Vec<DeviceRate>> {
    if tunable.kind() != ValueKind::DeviceRate {
        return Err(domain_error(tunable, content.trim()));
    }
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}

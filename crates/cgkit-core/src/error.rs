//! Error types for cgroup operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::controller::{Controller, Tunable};

/// Cgroup operation errors
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("Invalid group name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid id range {0:?} (expected e.g. \"0\", \"0-2\" or \"0-2,5\")")]
    InvalidRange(String),

    #[error("Invalid device spec {0:?} (expected \"MAJOR:MINOR RATE\")")]
    InvalidDeviceSpec(String),

    #[error("Failed to parse {tunable} value {content:?}")]
    ParseError { tunable: String, content: String },

    #[error("Value {value} out of range for {tunable} (expected {expected})")]
    ValueOutOfRange {
        tunable: String,
        value: i64,
        expected: &'static str,
    },

    #[error("Tunable {tunable} does not belong to the {controller} controller")]
    UnsupportedTunable {
        controller: Controller,
        tunable: Tunable,
    },

    #[error("Cgroup already exists: {controller}:{group}")]
    AlreadyExists { controller: Controller, group: String },

    #[error("Cgroup not found: {controller}:{group}")]
    NotFound { controller: Controller, group: String },

    #[error("Cgroup {controller}:{group} still has child groups")]
    NotEmpty { controller: Controller, group: String },

    #[error("Cgroup {controller}:{group} is busy (tasks still attached)")]
    Busy { controller: Controller, group: String },

    #[error("Failed to write {controller}.{tunable} for group {group}: {source}")]
    AttributeWriteError {
        controller: Controller,
        group: String,
        tunable: Tunable,
        #[source]
        source: io::Error,
    },

    #[error("Failed to attach pid {pid} to {controller}:{group}: {source}")]
    MembershipWriteError {
        controller: Controller,
        group: String,
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("Root group of the {controller} controller is missing at {root:?} (controller not mounted?)")]
    RootGroupMissing { controller: Controller, root: PathBuf },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CgroupError {
    /// Whether the error comes from bad caller input rather than from the
    /// kernel or the filesystem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CgroupError::InvalidName { .. }
                | CgroupError::InvalidRange(_)
                | CgroupError::InvalidDeviceSpec(_)
                | CgroupError::ParseError { .. }
                | CgroupError::ValueOutOfRange { .. }
                | CgroupError::UnsupportedTunable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CgroupError>;

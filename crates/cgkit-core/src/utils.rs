//! Utility functions for cgroup file access

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{CgroupError, Result};

/// Read a cgroup pseudo-file to string
pub fn read_cgroup_file(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Truncate `path` and write `content` with a single write call.
///
/// Cgroup pseudo-files parse one line per write, so a short write is
/// reported instead of being continued.
pub fn write_cgroup_file(path: &Path, content: &str) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let written = file.write(content.as_bytes())?;
    if written != content.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!(
                "short write to {:?}: {} of {} bytes",
                path,
                written,
                content.len()
            ),
        ));
    }

    Ok(())
}

/// Parse a membership file (`tasks` / `cgroup.procs`), one PID per line.
///
/// Blank lines are skipped; any other line that is not a PID is an error.
pub fn parse_pid_list(file_name: &str, content: &str) -> Result<Vec<i32>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<i32>().map_err(|_| CgroupError::ParseError {
                tunable: file_name.to_string(),
                content: line.to_string(),
            })
        })
        .collect()
}

/// Whether `path` has at least one subdirectory (a child group)
pub fn has_child_dirs(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .any(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        })
        .unwrap_or(false)
}

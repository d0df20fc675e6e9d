//! cgkit CLI
//!
//! Configuration, logging setup and command helpers behind the `cgkit` binary.

pub mod apply;
pub mod commands;
pub mod config;
pub mod logging;

pub use apply::{apply_groups, Action, Outcome};
pub use config::Config;

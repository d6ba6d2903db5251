//! High-level operations.
//!
//! This module contains the configuration run and the steps that follow
//! the probes: version stamping and file generation.

pub mod configure;
pub mod generate;
pub mod versions;

pub use configure::{configure, run, seed_env, ConfigureOptions, ConfigureOutcome, Session};
pub use generate::{generate_files, render};
pub use versions::{describe_worktree, stamp_versions, GitDescribe};

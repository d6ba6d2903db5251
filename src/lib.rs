//! probeconf - feature detection and build configuration for C projects
//!
//! This crate provides the library behind the `configure` binary: probing
//! a C toolchain for headers, libraries, defines and language features,
//! caching the positive answers, and rendering configuration headers and
//! Makefiles from the results.

pub mod core;
pub mod ops;
pub mod probe;
pub mod util;

/// Test utilities and mocks for probeconf unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a scripted process executor and project fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{CheckList, ConfigureError, EnvMap, Platform};
pub use ops::{run, ConfigureOptions, ConfigureOutcome, Session};
pub use probe::{HostId, ProbeCache, Prober};

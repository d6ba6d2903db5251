//! Core data structures for probeconf.
//!
//! This module contains the types every other layer works with:
//! - The configuration environment (EnvMap)
//! - The check manifest (CheckList)
//! - Target platforms and their conventions
//! - Fatal configuration errors

pub mod checks;
pub mod env;
pub mod error;
pub mod platform;

pub use checks::{CheckList, MANIFEST_FILE};
pub use env::{env_name, EnvMap};
pub use error::ConfigureError;
pub use platform::{Platform, PlatformSettings};

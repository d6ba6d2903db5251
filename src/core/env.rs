//! The configuration environment.
//!
//! Every probe reads compiler settings from, and writes its capability flag
//! into, an [`EnvMap`]. The map is owned by the caller and passed down
//! explicitly; the real process environment is only consulted once, when
//! the map is seeded.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Process environment variables copied into a fresh [`EnvMap`].
pub const SEEDED_VARS: &[&str] = &["CC", "CROSS_COMPILE", "CFLAGS", "LDFLAGS"];

/// Normalize a probe name into an environment key fragment.
///
/// Every non-alphanumeric character becomes `_`, surrounding underscores are
/// trimmed and the result is upper-cased: `sys/param.h` -> `SYS_PARAM_H`.
pub fn env_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_ascii_uppercase()
}

/// Ordered string-to-string table shared by probes and templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvMap {
    vars: BTreeMap<String, String>,
}

impl EnvMap {
    /// Create an empty map.
    pub fn new() -> Self {
        EnvMap {
            vars: BTreeMap::new(),
        }
    }

    /// Create a map seeded from the real process environment.
    pub fn from_process() -> Self {
        let mut env = EnvMap::new();
        for key in SEEDED_VARS {
            if let Ok(value) = std::env::var(key) {
                env.set(*key, value);
            }
        }
        env
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Get a value, or the empty string when unset.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set a value only if the key is not present yet.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Append a value, space-separated, to an existing entry.
    pub fn append(&mut self, key: &str, value: &str) {
        match self.vars.get_mut(key) {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(value);
            }
            _ => {
                self.vars.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Record the capability flag `HAVE_<NAME>` for a probe.
    pub fn have(&mut self, name: &str, present: bool) {
        self.set(have_key(name), if present { "1" } else { "0" });
    }

    /// Read back a capability flag. `None` when the probe never ran.
    pub fn has(&self, name: &str) -> Option<bool> {
        self.get(&have_key(name)).map(|v| v == "1")
    }

    /// Split a flags variable (`CFLAGS`, `LDFLAGS`) into arguments.
    pub fn split_flags(&self, key: &str) -> Result<Vec<String>> {
        let raw = self.get_or_empty(key);
        shell_words::split(raw).with_context(|| format!("failed to parse {}=`{}`", key, raw))
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Display for EnvMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.vars {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

fn have_key(name: &str) -> String {
    format!("HAVE_{}", env_name(name))
}

//! Persistent probe cache.
//!
//! Probe results are keyed by host, probe kind and probe name, so one cache
//! file can be shared between machines. Only positive results are recorded:
//! a "no" is always re-derived on the next run, because the environment may
//! have been fixed in the meantime.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::error::ConfigureError;
use crate::util::fs::write_atomic;

/// Default cache file name.
pub const CACHE_FILE: &str = "config.cache";

const FORMAT_VERSION: u32 = 1;

/// Identity of the machine the probes ran on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        HostId(id.into())
    }

    /// The local host name, or `localhost` when it cannot be determined.
    pub fn current() -> Self {
        let name = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        HostId(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of probe. Part of the cache key, so names never collide across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    Binary,
    Header,
    Library,
    Define,
    Compile,
    PkgConfig,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Binary => "binary",
            ProbeKind::Header => "header",
            ProbeKind::Library => "library",
            ProbeKind::Define => "define",
            ProbeKind::Compile => "compile",
            ProbeKind::PkgConfig => "pkg-config",
        }
    }

    /// Word used in `checking <label> <name>...` lines.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeKind::Compile => "for",
            ProbeKind::PkgConfig => "package",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a memoized probe result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProbeKey {
    pub host: HostId,
    pub kind: ProbeKind,
    pub name: String,
}

impl ProbeKey {
    pub fn new(host: &HostId, kind: ProbeKind, name: impl Into<String>) -> Self {
        ProbeKey {
            host: host.clone(),
            kind,
            name: name.into(),
        }
    }
}

/// Outcome of a memoized probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memo {
    /// Answered from the cache; the probe did not run.
    Cached,
    /// The probe ran and produced this result.
    Probed(bool),
}

impl Memo {
    pub fn passed(&self) -> bool {
        matches!(self, Memo::Cached | Memo::Probed(true))
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<ProbeKey>,
}

/// Memoized probe results.
#[derive(Debug, Clone, Default)]
pub struct ProbeCache {
    /// `None` when caching is disabled.
    path: Option<PathBuf>,
    entries: BTreeMap<ProbeKey, bool>,
}

impl ProbeCache {
    /// A cache that never answers and never persists.
    pub fn disabled() -> Self {
        ProbeCache {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    /// A cache backed by `path`, starting empty.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        ProbeCache {
            path: Some(path.into()),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache stored at `path`.
    ///
    /// An empty path disables caching, a missing file yields an empty cache
    /// and an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigureError> {
        if path.as_os_str().is_empty() {
            tracing::debug!("config cache disabled");
            return Ok(Self::disabled());
        }

        let mut cache = Self::empty(path);
        if !path.exists() {
            tracing::debug!("no config cache at {}", path.display());
            return Ok(cache);
        }

        let corrupt = |message: String| ConfigureError::CacheCorrupt {
            path: path.to_path_buf(),
            message,
        };

        let contents = std::fs::read(path).map_err(|e| corrupt(e.to_string()))?;
        let file: CacheFile =
            serde_json::from_slice(&contents).map_err(|e| corrupt(e.to_string()))?;
        if file.version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported cache format version {}",
                file.version
            )));
        }

        cache.entries = file.entries.into_iter().map(|key| (key, true)).collect();
        tracing::debug!(
            "loaded {} cached probe results from {}",
            cache.entries.len(),
            path.display()
        );
        Ok(cache)
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached result for `key`. `None` means "probe it".
    pub fn lookup(&self, key: &ProbeKey) -> Option<bool> {
        if !self.is_enabled() {
            return None;
        }
        self.entries.get(key).copied()
    }

    /// Record a probe result. Negative results are dropped.
    pub fn record(&mut self, key: ProbeKey, value: bool) {
        if value && self.is_enabled() {
            self.entries.insert(key, true);
        }
    }

    /// Answer from the cache, or run `probe` and record its result.
    pub fn memoize<F>(&mut self, key: ProbeKey, probe: F) -> Result<Memo>
    where
        F: FnOnce() -> Result<bool>,
    {
        if self.lookup(&key) == Some(true) {
            tracing::debug!("cache hit: {} {}", key.kind, key.name);
            return Ok(Memo::Cached);
        }

        let result = probe()?;
        self.record(key, result);
        Ok(Memo::Probed(result))
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole cache back to its file. No-op when disabled.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = CacheFile {
            version: FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .filter(|(_, v)| **v)
                .map(|(k, _)| k.clone())
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(path, &json)?;
        tracing::debug!("saved {} probe results to {}", file.entries.len(), path.display());
        Ok(())
    }
}

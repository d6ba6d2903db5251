//! Throwaway compilation targets.
//!
//! A probe writes its test program to a [`ScratchArtifact`] and points the
//! compiler at [`ScratchArtifact::object`]. Both files are deleted when the
//! artifact is dropped: on normal return, on early `?` return and while
//! unwinding from a panic. Failure to delete is logged and otherwise
//! ignored.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempPath;

use crate::core::env::env_name;

/// A scratch source file and the object/executable path derived from it.
#[derive(Debug)]
pub struct ScratchArtifact {
    source: Option<TempPath>,
    source_path: PathBuf,
    object: PathBuf,
}

impl ScratchArtifact {
    /// Create a uniquely named `.c` file in `dir` holding `content`.
    ///
    /// The file name embeds the probe kind and name, e.g.
    /// `probe-header-sys_param_h-a8Xk2Q.c`; the object path is the same
    /// stem with `binext` appended.
    pub fn create(dir: &Path, kind: &str, name: &str, content: &str, binext: &str) -> Result<Self> {
        let prefix = format!("probe-{}-{}-", kind, env_name(name).to_ascii_lowercase());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".c")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create scratch file in {}", dir.display()))?;

        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("failed to write scratch file {}", file.path().display()))?;

        let source = file.into_temp_path();
        let source_path = source.to_path_buf();
        let object = object_path(&source_path, binext);

        Ok(ScratchArtifact {
            source: Some(source),
            source_path,
            object,
        })
    }

    /// Path of the scratch source file.
    pub fn source(&self) -> &Path {
        &self.source_path
    }

    /// Path the compiler should write its output to.
    pub fn object(&self) -> &Path {
        &self.object
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            if let Err(e) = source.close() {
                tracing::debug!("failed to remove {}: {}", self.source_path.display(), e);
            }
        }
        match std::fs::remove_file(&self.object) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!("failed to remove {}: {}", self.object.display(), e),
        }
    }
}

/// Derive the sibling output path of a source file: same directory and
/// stem, with the platform's binary extension.
pub fn object_path(source: &Path, binext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}{}", stem, binext))
}

/// Run `f` with a scratch artifact that is removed as soon as `f` returns.
pub fn with_scratch<T>(
    dir: &Path,
    kind: &str,
    name: &str,
    content: &str,
    binext: &str,
    f: impl FnOnce(&ScratchArtifact) -> Result<T>,
) -> Result<T> {
    let scratch = ScratchArtifact::create(dir, kind, name, content, binext)?;
    f(&scratch)
}

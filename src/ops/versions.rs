//! Version stamping.
//!
//! The version manifest holds one `name=major.minor.patch` line per
//! component. When the project is a git checkout, the patch level is
//! replaced by the distance and abbreviated hash from `git describe`, so
//! development builds are distinguishable from releases.

use std::path::Path;

use git2::{DescribeFormatOptions, DescribeOptions, Repository};

use crate::core::env::{env_name, EnvMap};
use crate::core::error::ConfigureError;
use crate::util::fs::read_to_string;
use crate::util::shell::Shell;

/// Tag recorded for versions derived from a git checkout.
pub const GIT_TAG: &str = "git";

/// Result of describing the project worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitDescribe {
    /// No `.git` directory at the project root.
    NotVersioned,
    /// A checkout, but describe failed (no tags, no commits...).
    Failed(String),
    /// Long-format describe output, e.g. `v1.2-7-gabc1234`.
    Output(String),
}

impl GitDescribe {
    /// Patch level derived from the describe output: the commit distance
    /// and abbreviated hash, `7-gabc1234`.
    pub fn patch(&self) -> Option<String> {
        let GitDescribe::Output(out) = self else {
            return None;
        };
        let parts: Vec<&str> = out.trim().split('-').collect();
        if parts.len() < 2 {
            return None;
        }
        Some(parts[parts.len() - 2..].join("-"))
    }

    /// Value of `<NAME>_VERSION_TAG`.
    pub fn tag(&self) -> &'static str {
        match self {
            GitDescribe::NotVersioned => "",
            _ => GIT_TAG,
        }
    }
}

/// Run the equivalent of `git describe --long --tags` in `root`.
pub fn describe_worktree(root: &Path) -> GitDescribe {
    if !root.join(".git").exists() {
        return GitDescribe::NotVersioned;
    }

    let repo = match Repository::open(root) {
        Ok(repo) => repo,
        Err(e) => return GitDescribe::Failed(e.message().to_string()),
    };

    let mut opts = DescribeOptions::new();
    opts.describe_tags();
    let mut format = DescribeFormatOptions::new();
    format.always_use_long_format(true);

    match repo.describe(&opts).and_then(|d| d.format(Some(&format))) {
        Ok(out) => {
            tracing::debug!("git describe: {}", out);
            GitDescribe::Output(out)
        }
        Err(e) => {
            tracing::debug!("git describe failed: {}", e.message());
            GitDescribe::Failed(e.message().to_string())
        }
    }
}

/// One parsed manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub name: String,
    pub major: String,
    pub minor: String,
    pub patch: String,
}

/// Parse a version manifest. Blank lines and `#` comments are skipped.
pub fn parse_versions(contents: &str, path: &Path) -> Result<Vec<VersionEntry>, ConfigureError> {
    let mut entries = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |message: &str| ConfigureError::Manifest {
            path: path.to_path_buf(),
            line: idx + 1,
            message: message.to_string(),
        };

        let (name, version) = line
            .split_once('=')
            .ok_or_else(|| malformed("expected name=major.minor.patch"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed("missing component name"));
        }

        let fields: Vec<&str> = version.trim().split('.').collect();
        let [major, minor, patch] = fields.as_slice() else {
            return Err(malformed("version must have exactly three fields"));
        };
        if [major, minor, patch].iter().any(|f| f.is_empty()) {
            return Err(malformed("empty version field"));
        }

        entries.push(VersionEntry {
            name: name.to_string(),
            major: major.to_string(),
            minor: minor.to_string(),
            patch: patch.to_string(),
        });
    }

    Ok(entries)
}

/// Set the `<NAME>_VERSION*` keys for every manifest entry.
pub fn apply_versions(
    env: &mut EnvMap,
    entries: &[VersionEntry],
    describe: &GitDescribe,
    shell: &Shell,
) {
    let git_patch = describe.patch();
    let tag = describe.tag();

    for entry in entries {
        let prefix = format!("{}_VERSION", env_name(&entry.name));
        let patch = git_patch.clone().unwrap_or_else(|| entry.patch.clone());

        env.set(format!("{}_MAJOR", prefix), entry.major.as_str());
        env.set(format!("{}_MINOR", prefix), entry.minor.as_str());
        env.set(format!("{}_PATCH", prefix), patch.as_str());
        env.set(format!("{}_TAG", prefix), tag);
        env.set(
            prefix,
            format!("{}.{}.{}", entry.major, entry.minor, patch),
        );
        shell.echo(format_args!("{}... ", entry.name));
    }
}

/// Read the manifest at `root/path` and stamp versions into `env`.
pub fn stamp_versions(
    env: &mut EnvMap,
    root: &Path,
    path: &Path,
    shell: &Shell,
) -> Result<Vec<VersionEntry>, ConfigureError> {
    shell.checking(format_args!("versions file {}", path.display()));
    let describe = describe_worktree(root);
    let contents = read_to_string(&root.join(path))?;
    let entries = parse_versions(&contents, path)?;
    apply_versions(env, &entries, &describe, shell);
    shell.line("done");
    Ok(entries)
}

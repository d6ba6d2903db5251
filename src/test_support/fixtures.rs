//! Test fixtures for common test scenarios.
//!
//! This module provides a small C project tree and a trimmed check list
//! that the orchestrator tests run against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::checks::{BinaryCheck, CheckList, CompileCheck, DefineCheck, LibraryCheck};

/// Fixture for a project tree on disk.
#[derive(Debug, Clone, Default)]
pub struct ProjectFixture {
    /// Files (path relative to project root -> content).
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    pub fn new() -> Self {
        ProjectFixture::default()
    }

    /// A project with a version manifest, a Makefile template, one
    /// generated header and one feature snippet.
    pub fn minimal() -> Self {
        ProjectFixture::new()
            .file("versions", minimal_versions())
            .file("Makefile.in", minimal_makefile_in())
            .file("include/config.h.in", minimal_config_h_in())
            .file("test/have_poll.c", minimal_snippet())
    }

    /// Add or replace a file.
    pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Write all files below `root`.
    pub fn write_to(&self, root: &Path) {
        for (rel, content) in &self.files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
        }
    }

    /// Write the project into a fresh temporary directory.
    pub fn create(&self) -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().unwrap();
        self.write_to(tmp.path());
        tmp
    }
}

pub fn minimal_versions() -> &'static str {
    "# name=major.minor.patch\ndmr=0.2.1\n"
}

pub fn minimal_makefile_in() -> &'static str {
    "PLATFORM = @PLATFORM@\n\
     CC = @CC@\n\
     PREFIX = {{args.prefix}}\n\
     LUA = {{env.LUA_VERSION}}\n"
}

pub fn minimal_config_h_in() -> &'static str {
    "#define HAVE_STDIO_H @HAVE_STDIO_H@\n\
     #define DMR_VERSION \"@DMR_VERSION@\"\n\
     {{#if args.with_debug}}#define DEBUG 1\n{{/if}}"
}

pub fn minimal_snippet() -> &'static str {
    "#include <poll.h>\nint main(void) { return poll(0, 0, 0); }\n"
}

/// A check list small enough to script by hand, matching
/// [`ProjectFixture::minimal`].
pub fn minimal_checks() -> CheckList {
    CheckList {
        required_headers: vec![
            "stdio.h".to_string(),
            "stdlib.h".to_string(),
            "string.h".to_string(),
            "time.h".to_string(),
        ],
        optional_headers: vec!["libgen.h".to_string()],
        required_libraries: vec![LibraryCheck::new("m", &["math.h"])],
        optional_libraries: vec![LibraryCheck::new("bsd", &["bsd/bsd.h"])],
        defines: vec![DefineCheck::new("SO_REUSEPORT", &["sys/socket.h"])],
        binaries: vec![BinaryCheck {
            name: "pkg-config".to_string(),
            args: vec!["--version".to_string()],
        }],
        optional_compiles: vec![CompileCheck {
            name: "poll".to_string(),
            source: PathBuf::from("test/have_poll.c"),
            libs: Vec::new(),
        }],
        generated_files: vec![PathBuf::from("include/config.h")],
        ..CheckList::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project_layout() {
        let tmp = ProjectFixture::minimal().create();
        assert!(tmp.path().join("versions").is_file());
        assert!(tmp.path().join("Makefile.in").is_file());
        assert!(tmp.path().join("include/config.h.in").is_file());
        assert!(tmp.path().join("test/have_poll.c").is_file());
    }

    #[test]
    fn test_minimal_checks_match_project() {
        let checks = minimal_checks();
        let tmp = ProjectFixture::minimal().create();
        for target in &checks.generated_files {
            let mut template = target.clone().into_os_string();
            template.push(".in");
            assert!(tmp.path().join(template).is_file());
        }
        for compile in &checks.optional_compiles {
            assert!(tmp.path().join(&compile.source).is_file());
        }
    }
}

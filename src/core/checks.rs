//! The check manifest: what a configuration run probes for.
//!
//! A project may describe its checks in `configure.toml`:
//!
//! ```toml
//! required_headers = ["stdio.h", "stdlib.h"]
//! optional_headers = ["libgen.h"]
//!
//! [toolchain]
//! cflags = ["-O2"]
//!
//! [[required_libraries]]
//! name = "m"
//! headers = ["math.h"]
//!
//! [[optional_compiles]]
//! name = "epoll"
//! source = "test/have_epoll.c"
//! ```
//!
//! Every table that is left out keeps its built-in default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default manifest file name, looked up in the project root.
pub const MANIFEST_FILE: &str = "configure.toml";

/// Checks performed by a configuration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckList {
    /// Compiler overrides applied before any probe runs.
    pub toolchain: ToolchainOverrides,

    /// Headers that must be present.
    pub required_headers: Vec<String>,

    /// Headers that are probed best-effort.
    pub optional_headers: Vec<String>,

    /// Libraries that must link.
    pub required_libraries: Vec<LibraryCheck>,

    /// Libraries that are probed best-effort.
    pub optional_libraries: Vec<LibraryCheck>,

    /// Preprocessor defines.
    pub defines: Vec<DefineCheck>,

    /// Binaries probed by invoking them.
    pub binaries: Vec<BinaryCheck>,

    /// Feature snippets probed best-effort.
    pub optional_compiles: Vec<CompileCheck>,

    /// Feature snippets that must compile and run.
    pub required_compiles: Vec<CompileCheck>,

    /// Scripting runtime discovery.
    pub runtime: RuntimeCheck,

    /// Files rendered from `<file>.in` templates.
    pub generated_files: Vec<PathBuf>,

    /// Build file rendered last, from `<makefile>.in`.
    pub makefile: PathBuf,

    /// Version manifest.
    pub versions: PathBuf,
}

/// Compiler settings taken from the manifest instead of the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainOverrides {
    /// C compiler.
    pub cc: Option<String>,

    /// Extra compiler flags, appended to `CFLAGS`.
    pub cflags: Vec<String>,

    /// Extra linker flags, appended to `LDFLAGS`.
    pub ldflags: Vec<String>,
}

/// A library probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryCheck {
    /// Library name as passed to `-l`.
    pub name: String,

    /// Headers included by the test program.
    #[serde(default)]
    pub headers: Vec<String>,
}

impl LibraryCheck {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        LibraryCheck {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// A preprocessor define probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefineCheck {
    /// Symbol tested with `#if defined(...)`.
    pub name: String,

    #[serde(default)]
    pub headers: Vec<String>,

    #[serde(default)]
    pub libs: Vec<String>,

    /// Whether the test program must also run and exit 0.
    #[serde(default = "default_true")]
    pub run: bool,
}

impl DefineCheck {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        DefineCheck {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            libs: Vec::new(),
            run: true,
        }
    }
}

/// A binary probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinaryCheck {
    pub name: String,

    /// Arguments passed when probing, e.g. `--version`.
    #[serde(default)]
    pub args: Vec<String>,
}

/// A feature probe backed by a C source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileCheck {
    /// Human-readable feature name; `HAVE_<NAME>` derives from it.
    pub name: String,

    /// Source file, relative to the project root.
    pub source: PathBuf,

    #[serde(default)]
    pub libs: Vec<String>,
}

impl CompileCheck {
    fn test(name: &str, file: &str) -> Self {
        CompileCheck {
            name: name.to_string(),
            source: Path::new("test").join(file),
            libs: Vec::new(),
        }
    }
}

/// Scripting runtime discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeCheck {
    /// Runtime name used in messages and as the environment prefix.
    pub name: String,

    /// Header included by the library fallback probe.
    pub header: String,

    /// Candidate package / library names, in priority order.
    pub candidates: Vec<String>,
}

impl RuntimeCheck {
    /// Environment key holding the selected candidate, e.g. `LUA_VERSION`.
    pub fn version_key(&self) -> String {
        format!("{}_VERSION", crate::core::env::env_name(&self.name))
    }

    /// Environment key telling whether pkg-config found the runtime.
    pub fn pkg_config_key(&self) -> String {
        format!("{}_USE_PKG_CONFIG", crate::core::env::env_name(&self.name))
    }
}

impl Default for RuntimeCheck {
    fn default() -> Self {
        RuntimeCheck {
            name: "lua".to_string(),
            header: "lua.h".to_string(),
            candidates: ["lua5.3", "lua53", "lua5.2", "lua52", "lua"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CheckList {
    fn default() -> Self {
        CheckList {
            toolchain: ToolchainOverrides::default(),
            required_headers: strings(&[
                "ctype.h",
                "errno.h",
                "inttypes.h",
                "signal.h",
                "stdarg.h",
                "stdbool.h",
                "stddef.h",
                "stdio.h",
                "stdlib.h",
                "string.h",
                "time.h",
                "sys/param.h",
            ]),
            optional_headers: strings(&[
                "errno.h",
                "libgen.h",
                "arpa/inet.h",
                "net/ethernet.h",
                "netinet/ip.h",
                "netinet/udp.h",
            ]),
            required_libraries: vec![
                LibraryCheck::new("m", &["math.h"]),
                LibraryCheck::new("talloc", &["talloc.h"]),
            ],
            optional_libraries: vec![
                LibraryCheck::new("bsd", &["bsd/bsd.h"]),
                LibraryCheck::new("portaudio", &["portaudio.h"]),
                LibraryCheck::new("proc", &["libproc.h"]),
            ],
            defines: vec![
                DefineCheck::new("SO_REUSEADDR", &["sys/socket.h"]),
                DefineCheck::new("SO_REUSEPORT", &["sys/socket.h"]),
            ],
            binaries: vec![BinaryCheck {
                name: "pkg-config".to_string(),
                args: strings(&["--version"]),
            }],
            optional_compiles: vec![
                CompileCheck::test("mingw", "have_mingw.c"),
                CompileCheck::test("inline", "have_inline.c"),
                CompileCheck::test("restrict", "have_restrict.c"),
                CompileCheck::test("binary literals", "have_binary_literals.c"),
                CompileCheck::test("visibility attribute", "have_visibility_attribute.c"),
                CompileCheck::test("visibility declspec", "have_visibility_declspec.c"),
                CompileCheck::test("libc ipv6", "have_libc_ipv6.c"),
                CompileCheck::test("libc scope_id", "have_libc_scope_id.c"),
                CompileCheck::test("if_indextoname", "have_if_indextoname.c"),
                CompileCheck::test("getline", "have_getline.c"),
                CompileCheck::test("strtok_r", "have_strtok_r.c"),
                CompileCheck::test("socklen_t", "have_socklen_t.c"),
                CompileCheck::test("epoll", "have_epoll.c"),
                CompileCheck::test("/dev/epoll", "have_dev_epoll.c"),
                CompileCheck::test("kqueue", "have_kqueue.c"),
                CompileCheck::test("poll", "have_poll.c"),
                CompileCheck::test("select", "have_select.c"),
            ],
            required_compiles: Vec::new(),
            runtime: RuntimeCheck::default(),
            generated_files: [
                "include/dmr/config.h",
                "include/dmr/version.h",
                "src/cmd/noisebridge/version.h",
                "src/common/config.h",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            makefile: PathBuf::from("Makefile"),
            versions: PathBuf::from("versions"),
        }
    }
}

impl CheckList {
    /// Parse a manifest from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read check manifest: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse check manifest: {}", path.display()))
    }

    /// Load the manifest from an explicit path, or `configure.toml` in the
    /// project root when it exists, or fall back to the built-in checks.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(&root.join(path)),
            None => {
                let default_path = root.join(MANIFEST_FILE);
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    tracing::debug!("no {} found, using built-in checks", MANIFEST_FILE);
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_checks() {
        let checks = CheckList::default();
        assert_eq!(checks.required_headers.len(), 12);
        assert_eq!(checks.required_headers.last().unwrap(), "sys/param.h");
        assert_eq!(checks.required_libraries[0], LibraryCheck::new("m", &["math.h"]));
        assert_eq!(checks.binaries[0].name, "pkg-config");
        assert!(checks.required_compiles.is_empty());
        assert_eq!(checks.runtime.candidates[0], "lua5.3");
        assert_eq!(checks.runtime.version_key(), "LUA_VERSION");
        assert_eq!(checks.runtime.pkg_config_key(), "LUA_USE_PKG_CONFIG");
    }

    #[test]
    fn test_partial_manifest_keeps_defaults() {
        let checks = CheckList::from_toml(
            r#"
required_headers = ["stdio.h"]
generated_files = []

[toolchain]
cc = "clang"
cflags = ["-O2"]

[[required_libraries]]
name = "z"
headers = ["zlib.h"]

[[defines]]
name = "MSG_NOSIGNAL"
headers = ["sys/socket.h"]
run = false
"#,
        )
        .unwrap();

        assert_eq!(checks.required_headers, vec!["stdio.h".to_string()]);
        assert!(checks.generated_files.is_empty());
        assert_eq!(checks.toolchain.cc.as_deref(), Some("clang"));
        assert_eq!(checks.required_libraries, vec![LibraryCheck::new("z", &["zlib.h"])]);
        assert!(!checks.defines[0].run);
        // Untouched tables fall back to the built-in lists.
        assert_eq!(checks.optional_headers, CheckList::default().optional_headers);
        assert_eq!(checks.makefile, PathBuf::from("Makefile"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(CheckList::from_toml("required_header = [\"stdio.h\"]").is_err());
    }

    #[test]
    fn test_discover() {
        let tmp = TempDir::new().unwrap();
        let checks = CheckList::discover(tmp.path(), None).unwrap();
        assert_eq!(checks, CheckList::default());

        std::fs::write(tmp.path().join(MANIFEST_FILE), "optional_headers = []\n").unwrap();
        let checks = CheckList::discover(tmp.path(), None).unwrap();
        assert!(checks.optional_headers.is_empty());

        assert!(CheckList::discover(tmp.path(), Some(Path::new("missing.toml"))).is_err());
    }
}

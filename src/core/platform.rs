//! Target platform resolution.
//!
//! Resolution runs before any probe: it fills in the binary and library
//! naming conventions probes rely on (`BINEXT` in particular), extends the
//! required checks with platform libraries and adds search paths.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::checks::{CheckList, LibraryCheck};
use crate::core::env::EnvMap;
use crate::core::error::ConfigureError;
use crate::util::fs::is_executable;
use crate::util::shell::Shell;

/// Target platform family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Unrecognized(String),
}

impl Platform {
    /// Parse a platform name as given on the command line.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "linux" | "linux2" => Platform::Linux,
            "darwin" | "macos" => Platform::Darwin,
            "win32" | "win64" | "windows" => Platform::Windows,
            _ => Platform::Unrecognized(name.to_string()),
        }
    }

    /// The platform this binary was built for.
    pub fn host() -> Self {
        Platform::parse(std::env::consts::OS)
    }

    /// Linux and Darwin.
    pub fn is_posix(&self) -> bool {
        matches!(self, Platform::Linux | Platform::Darwin)
    }

    pub fn name(&self) -> &str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
            Platform::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File naming conventions of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conventions {
    pub binext: &'static str,
    pub arlibpre: &'static str,
    pub arlibext: &'static str,
    pub shlibpre: &'static str,
    pub shlibext: &'static str,
}

impl Conventions {
    fn apply(&self, env: &mut EnvMap) {
        env.set("BINEXT", self.binext);
        env.set("ARLIBPRE", self.arlibpre);
        env.set("ARLIBEXT", self.arlibext);
        env.set("SHLIBPRE", self.shlibpre);
        env.set("SHLIBEXT", self.shlibext);
    }
}

const LINUX: Conventions = Conventions {
    binext: "",
    arlibpre: "lib",
    arlibext: ".a",
    shlibpre: "lib",
    shlibext: ".so",
};

const DARWIN: Conventions = Conventions {
    binext: "",
    arlibpre: "lib",
    arlibext: ".a",
    shlibpre: "lib",
    shlibext: ".dylib",
};

const WINDOWS: Conventions = Conventions {
    binext: ".exe",
    arlibpre: "lib",
    arlibext: ".a",
    shlibpre: "",
    shlibext: ".dll",
};

/// A third-party package manager installation on darwin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManager {
    /// Root qualifies when `<root>/bin/brew` is executable.
    Homebrew(PathBuf),
    /// Root qualifies when it is a directory.
    MacPorts(PathBuf),
}

impl PackageManager {
    pub fn root(&self) -> &Path {
        match self {
            PackageManager::Homebrew(root) | PackageManager::MacPorts(root) => root,
        }
    }

    fn is_installed(&self) -> bool {
        match self {
            PackageManager::Homebrew(root) => is_executable(&root.join("bin").join("brew")),
            PackageManager::MacPorts(root) => root.is_dir(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PackageManager::Homebrew(_) => "Homebrew (http://brew.sh/)",
            PackageManager::MacPorts(_) => "MacPorts (https://www.macports.org)",
        }
    }
}

/// Known package manager roots, in priority order.
pub fn default_package_managers() -> Vec<PackageManager> {
    let brew = ["/usr/local", "/opt/brew", "/opt/homebrew"]
        .iter()
        .map(|r| PackageManager::Homebrew(PathBuf::from(r)));
    let ports = ["/opt/mports", "/opt/macports", "/opt/local"]
        .iter()
        .map(|r| PackageManager::MacPorts(PathBuf::from(r)));
    brew.chain(ports).collect()
}

/// First installed package manager among `candidates`.
pub fn find_package_manager(candidates: &[PackageManager]) -> Option<&PackageManager> {
    candidates.iter().find(|pm| pm.is_installed())
}

/// Inputs to platform resolution.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    /// MinGW root for windows targets.
    pub mingw: Option<PathBuf>,
    /// Package manager candidates searched on darwin.
    pub package_managers: Vec<PackageManager>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        PlatformSettings {
            mingw: None,
            package_managers: default_package_managers(),
        }
    }
}

/// Apply platform conventions to `env` and platform requirements to
/// `checks`.
///
/// Fails without touching `env` or `checks` when the platform is not
/// supported or a windows target has no MinGW root.
pub fn resolve(
    platform: &Platform,
    settings: &PlatformSettings,
    env: &mut EnvMap,
    checks: &mut CheckList,
    shell: &Shell,
) -> Result<(), ConfigureError> {
    shell.checking(format_args!("platform... {}", platform));

    match platform {
        Platform::Linux => {
            add_posix_requirements(env, checks);
            LINUX.apply(env);
            shell.line("ok");
        }
        Platform::Darwin => {
            add_posix_requirements(env, checks);
            DARWIN.apply(env);
            shell.line("ok");
            resolve_darwin_search_paths(settings, env, shell);
        }
        Platform::Windows => {
            let Some(mingw) = settings.mingw.as_deref() else {
                shell.line("no");
                return Err(ConfigureError::MissingMingw);
            };
            WINDOWS.apply(env);
            resolve_windows(mingw, env, checks);
            shell.line("ok");
        }
        Platform::Unrecognized(name) => {
            shell.line("not supported");
            return Err(ConfigureError::UnsupportedPlatform(name.clone()));
        }
    }

    tracing::debug!("resolved platform {}", platform);
    Ok(())
}

fn add_posix_requirements(env: &mut EnvMap, checks: &mut CheckList) {
    checks.required_libraries.extend([
        LibraryCheck::new("pthread", &["pthread.h"]),
        LibraryCheck::new("pcap", &["pcap.h"]),
    ]);
    env.set("LIBPCAP_NAME", "pcap");
}

fn resolve_darwin_search_paths(settings: &PlatformSettings, env: &mut EnvMap, shell: &Shell) {
    match find_package_manager(&settings.package_managers) {
        Some(pm) => {
            let root = pm.root().display();
            shell.line(format_args!("enabling {} support in {}...", pm.describe(), root));
            env.append("CFLAGS", &format!("-I{}/include", root));
            env.append("LDFLAGS", &format!("-L{}/lib", root));
        }
        None => {
            shell.line("no package manager was detected, it is highly recommended to get either:");
            shell.line(" - Homebrew, see http://brew.sh/");
            shell.line(" - MacPorts, see https://www.macports.org/");
        }
    }

    // Bundled libraries come last so a package manager's copies win.
    env.append("CFLAGS", "-Isupport/darwin/include");
    env.append("LDFLAGS", "-Lsupport/darwin/lib");
}

fn resolve_windows(mingw: &Path, env: &mut EnvMap, checks: &mut CheckList) {
    env.append("CFLAGS", "-Isupport/windows/include");
    env.append("CFLAGS", &format!("-I{}", mingw.join("include").display()));
    env.append(
        "CFLAGS",
        &format!("-I{}", mingw.join("include").join("ddk").display()),
    );
    env.append("LDFLAGS", "-Lsupport/windows/lib");
    env.set("LIBPCAP_NAME", "wpcap");

    // usbioctl.h and usbiodef.h come from the Windows Driver Kit.
    checks.required_headers.extend(
        ["windows.h", "usbioctl.h", "usbiodef.h"]
            .iter()
            .map(|h| h.to_string()),
    );
    checks.required_libraries.extend([
        LibraryCheck::new("ws2_32", &["winsock2.h"]),
        LibraryCheck::new("hid", &["usbioctl.h", "usbiodef.h"]),
        LibraryCheck::new("setupapi", &["windows.h"]),
        LibraryCheck::new("wpcap", &["pcap.h", "Packet32.h"]),
    ]);
}

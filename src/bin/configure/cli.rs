//! CLI definitions using clap.

use std::path::{Path, PathBuf};

use clap::Parser;

use probeconf::ops::configure::{ConfigureOptions, DEFAULT_PREFIX};
use probeconf::probe::cache::CACHE_FILE;

/// Probe the host toolchain and generate build configuration
#[derive(Parser)]
#[command(name = "configure")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Probe cache file, "" to disable caching
    #[arg(long, value_name = "PATH", default_value = CACHE_FILE)]
    pub config_cache: String,

    /// Cross compiler prefix, e.g. arm-linux-gnueabihf
    #[arg(long, value_name = "PREFIX")]
    pub cross_compile: Option<String>,

    /// Command used to run cross-compiled test programs
    #[arg(long, value_name = "COMMAND")]
    pub cross_execute: Option<String>,

    /// Target platform (default: host platform)
    #[arg(long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Installation prefix
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Build directory (default: <directory>/build)
    #[arg(long, value_name = "PATH")]
    pub builddir: Option<PathBuf>,

    /// Build with debug symbols
    #[arg(long)]
    pub with_debug: bool,

    /// Build with mbelib support
    #[arg(long)]
    pub with_mbelib: bool,

    /// MinGW installation path (required for windows targets)
    #[arg(long, value_name = "PATH")]
    pub with_mingw: Option<PathBuf>,

    /// Check manifest (default: configure.toml when present)
    #[arg(long, value_name = "PATH")]
    pub checks: Option<PathBuf>,

    /// Project directory to configure
    #[arg(short = 'C', long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Configure options for a run started from `cwd`.
    pub fn options(&self, cwd: &Path) -> ConfigureOptions {
        let root = match &self.directory {
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };

        let mut options = ConfigureOptions::new(&root);
        options.config_cache = PathBuf::from(&self.config_cache);
        options.cross_compile = self.cross_compile.clone();
        options.cross_execute = self.cross_execute.clone();
        options.platform = self.platform.clone();
        options.prefix = self.prefix.clone();
        if let Some(builddir) = &self.builddir {
            options.builddir = cwd.join(builddir);
        }
        options.with_debug = self.with_debug;
        options.with_mbelib = self.with_mbelib;
        options.with_mingw = self.with_mingw.clone();
        options.checks = self.checks.clone();
        options
    }
}

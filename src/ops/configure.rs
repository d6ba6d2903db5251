//! The configuration run.
//!
//! [`configure`] runs every check in a fixed order against a [`Prober`].
//! [`run`] wraps it: it opens `config.log`, loads the probe cache, seeds
//! the environment, runs the checks and then always flushes the cache and
//! closes the log before reporting the outcome.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::checks::CheckList;
use crate::core::env::{EnvMap, SEEDED_VARS};
use crate::core::error::ConfigureError;
use crate::core::platform::{self, default_package_managers, PackageManager, Platform, PlatformSettings};
use crate::ops::generate::generate_files;
use crate::ops::versions::stamp_versions;
use crate::probe::cache::CACHE_FILE;
use crate::probe::{discover_runtime, CrossSettings, HostId, ProbeCache, ProbeContext, Prober};
use crate::util::log::{ConfigLog, LOG_FILE};
use crate::util::process::{Executor, Invoker, SystemExecutor};
use crate::util::shell::Shell;

/// Default installation prefix.
pub const DEFAULT_PREFIX: &str = "/usr/local";

/// Options of a configuration run.
///
/// Serialized as the `args` object of generated-file templates.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureOptions {
    /// Project root. Relative paths below are resolved against it.
    pub root: PathBuf,
    /// Probe cache file; empty disables caching.
    pub config_cache: PathBuf,
    /// Cross compiler prefix without the trailing `-`.
    pub cross_compile: Option<String>,
    /// Command used to run target binaries.
    pub cross_execute: Option<String>,
    /// Target platform name; the host platform when unset.
    pub platform: Option<String>,
    pub prefix: String,
    pub builddir: PathBuf,
    pub with_debug: bool,
    pub with_mbelib: bool,
    pub with_mingw: Option<PathBuf>,
    /// Check manifest; `configure.toml` in the root when unset.
    pub checks: Option<PathBuf>,
}

impl ConfigureOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        ConfigureOptions {
            builddir: root.join("build"),
            root,
            config_cache: PathBuf::from(CACHE_FILE),
            cross_compile: None,
            cross_execute: None,
            platform: None,
            prefix: DEFAULT_PREFIX.to_string(),
            with_debug: false,
            with_mbelib: false,
            with_mingw: None,
            checks: None,
        }
    }

    /// The target platform.
    pub fn platform(&self) -> Platform {
        match self.platform.as_deref() {
            Some(name) => Platform::parse(name),
            None => Platform::host(),
        }
    }

    /// Cache file path; empty when caching is disabled.
    pub fn cache_path(&self) -> PathBuf {
        if self.config_cache.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            self.root.join(&self.config_cache)
        }
    }

    /// Cross compiler prefix; an empty `--cross-compile` counts as unset.
    pub fn cross_prefix(&self) -> Option<&str> {
        self.cross_compile.as_deref().filter(|p| !p.is_empty())
    }

    pub fn cross_settings(&self) -> CrossSettings {
        CrossSettings {
            compiling: self.cross_prefix().is_some(),
            execute: self.cross_execute.clone(),
        }
    }
}

/// Everything a run talks to outside of its options.
pub struct Session {
    pub executor: Box<dyn Executor>,
    pub shell: Shell,
    pub host: HostId,
    /// Base environment, before options and manifest overrides.
    pub env: EnvMap,
    pub package_managers: Vec<PackageManager>,
    pub scratch_dir: PathBuf,
}

impl Session {
    /// A session backed by real processes and the real environment.
    pub fn system(options: &ConfigureOptions, shell: Shell) -> Self {
        Session {
            executor: Box::new(SystemExecutor::in_dir(&options.root)),
            shell,
            host: HostId::current(),
            env: EnvMap::from_process(),
            package_managers: default_package_managers(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Result of [`run`], with the final environment and the shell handed
/// back to the caller.
#[derive(Debug)]
pub struct ConfigureOutcome {
    /// Files written, or the condition that stopped the run.
    pub result: Result<Vec<PathBuf>, ConfigureError>,
    pub env: EnvMap,
    pub shell: Shell,
}

impl ConfigureOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the starting environment from the process environment, the
/// manifest's toolchain overrides and the options.
pub fn seed_env(mut env: EnvMap, checks: &CheckList, options: &ConfigureOptions) -> EnvMap {
    if let Some(prefix) = options.cross_prefix() {
        env.set("CROSS_COMPILE", format!("{}-", prefix));
    }

    if let Some(cc) = &checks.toolchain.cc {
        env.set("CC", cc.as_str());
    }
    let default_cc = format!("{}gcc", env.get_or_empty("CROSS_COMPILE"));
    env.set_default("CC", default_cc);

    if !checks.toolchain.cflags.is_empty() {
        env.append("CFLAGS", &shell_words::join(&checks.toolchain.cflags));
    }
    if !checks.toolchain.ldflags.is_empty() {
        env.append("LDFLAGS", &shell_words::join(&checks.toolchain.ldflags));
    }
    for key in SEEDED_VARS {
        env.set_default(*key, "");
    }

    env.set("PREFIX", options.prefix.as_str());
    env.set("BUILDDIR", options.builddir.display().to_string());
    env.set("PLATFORM", options.platform().name());
    env.set("WITH_DEBUG", flag(options.with_debug));
    env.set("WITH_MBELIB", flag(options.with_mbelib));
    env
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Run every check, stamp versions and write the generated files.
///
/// Stops at the first failed required check. Returns the paths written.
pub fn configure(
    prober: &mut Prober,
    mut checks: CheckList,
    platform: &Platform,
    settings: &PlatformSettings,
    options: &ConfigureOptions,
) -> Result<Vec<PathBuf>, ConfigureError> {
    {
        let (env, shell) = prober.env_and_shell();
        platform::resolve(platform, settings, env, &mut checks, shell)?;
    }

    for var in SEEDED_VARS {
        let value = prober.env().get_or_empty(var).to_string();
        prober.log(format!("env: {}={}", var, value));
    }

    let cc = prober.context().cc();
    if !prober.compiler(&cc)? {
        return Err(ConfigureError::CompilerUnusable(cc));
    }

    for binary in &checks.binaries {
        prober.binary(&binary.name, &binary.args)?;
    }

    for header in &checks.required_headers {
        if !prober.header(header)? {
            return Err(ConfigureError::RequiredHeader(header.clone()));
        }
    }
    for header in &checks.optional_headers {
        prober.header(header)?;
    }

    for define in &checks.defines {
        prober.define(&define.name, &define.headers, &define.libs, define.run)?;
    }

    for lib in &checks.required_libraries {
        if !prober.library(&lib.name, &lib.headers)? {
            return Err(ConfigureError::RequiredLibrary(lib.name.clone()));
        }
    }
    for lib in &checks.optional_libraries {
        prober.library(&lib.name, &lib.headers)?;
    }

    for compile in &checks.optional_compiles {
        prober.compile(&compile.name, &compile.source, &compile.libs)?;
    }
    for compile in &checks.required_compiles {
        if !prober.compile(&compile.name, &compile.source, &compile.libs)? {
            return Err(ConfigureError::RequiredCompile(compile.name.clone()));
        }
    }

    discover_runtime(prober, &checks.runtime, platform)?;

    {
        let (env, shell) = prober.env_and_shell();
        stamp_versions(env, &options.root, &checks.versions, shell)?;
    }

    let args = serde_json::to_value(options).map_err(anyhow::Error::from)?;
    let targets = checks
        .generated_files
        .iter()
        .chain([&checks.makefile])
        .map(PathBuf::as_path);
    generate_files(&options.root, targets, prober.env(), &args, prober.shell())
}

fn host_summary(host: &HostId) -> String {
    format!(
        "{} {} {}",
        host,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Run a complete configuration in `options.root`.
///
/// The probe cache is flushed and the log closed on every path that got
/// far enough to open them.
pub fn run(options: &ConfigureOptions, session: Session) -> ConfigureOutcome {
    let Session {
        executor,
        shell,
        host,
        env,
        package_managers,
        scratch_dir,
    } = session;

    let mut log = match ConfigLog::create(&options.root.join(LOG_FILE)) {
        Ok(log) => log,
        Err(e) => {
            return ConfigureOutcome {
                result: Err(e.into()),
                env,
                shell,
            }
        }
    };

    let argv: Vec<String> = std::env::args().collect();
    log.line(format!("starting: {}", argv.join(" ")));
    log.line(format!("uname: {}", host_summary(&host)));
    let platform = options.platform();
    log.line(format!("platform: {}", platform));

    let prepared = CheckList::discover(&options.root, options.checks.as_deref())
        .map_err(ConfigureError::from)
        .and_then(|checks| Ok((checks, ProbeCache::load(&options.cache_path())?)));
    let (checks, cache) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            log.line(format!("configure failed: {}", e));
            close_log(log);
            return ConfigureOutcome {
                result: Err(e),
                env,
                shell,
            };
        }
    };

    let env = seed_env(env, &checks, options);
    let ctx = ProbeContext::new(env, Invoker::new(executor, log), shell, &options.root)
        .with_scratch_dir(scratch_dir)
        .with_cross(options.cross_settings());
    let mut prober = Prober::new(ctx, cache, host);
    let settings = PlatformSettings {
        mingw: options.with_mingw.clone(),
        package_managers,
    };

    let result = configure(&mut prober, checks, &platform, &settings, options);

    let (ctx, cache) = prober.into_parts();
    let ProbeContext {
        env, invoker, shell, ..
    } = ctx;
    let mut log = invoker.into_log();

    if let Err(e) = cache.flush() {
        tracing::warn!("failed to save probe cache: {:#}", e);
        log.line(format!("failed to save probe cache: {:#}", e));
    }
    match &result {
        Ok(written) => log.line(format!("configure succeeded, wrote {} files", written.len())),
        Err(e) => log.line(format!("configure failed: {}", e)),
    }
    close_log(log);

    ConfigureOutcome { result, env, shell }
}

fn close_log(log: ConfigLog) {
    let path = log.path().map(Path::to_path_buf);
    if let Err(e) = log.close() {
        tracing::warn!(
            "failed to close {}: {}",
            path.unwrap_or_else(|| PathBuf::from(LOG_FILE)).display(),
            e
        );
    }
}

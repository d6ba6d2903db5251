//! Capability probes.
//!
//! A [`Prober`] owns everything a probe touches: the environment map, the
//! invoker (and through it the config log), the operator shell and the
//! probe cache. Each public probe method is memoized by kind and name and
//! records its `HAVE_<NAME>` flag in the environment before returning.

pub mod cache;
pub mod checks;
pub mod runtime;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::env::EnvMap;
use crate::util::log::ConfigLog;
use crate::util::process::Invoker;
use crate::util::shell::Shell;

pub use cache::{HostId, Memo, ProbeCache, ProbeKey, ProbeKind};
pub use runtime::discover_runtime;

/// Cross-compilation settings affecting whether probe binaries can run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossSettings {
    /// A cross compiler prefix is in use.
    pub compiling: bool,
    /// Command prefix used to run target binaries, e.g. `qemu-arm`.
    pub execute: Option<String>,
}

/// State shared by all probes of one configuration run.
#[derive(Debug)]
pub struct ProbeContext {
    pub env: EnvMap,
    pub invoker: Invoker,
    pub shell: Shell,
    /// Project root; feature-compile sources are relative to it.
    pub root: PathBuf,
    /// Directory receiving scratch files.
    pub scratch_dir: PathBuf,
    pub cross: CrossSettings,
}

impl ProbeContext {
    pub fn new(env: EnvMap, invoker: Invoker, shell: Shell, root: impl Into<PathBuf>) -> Self {
        ProbeContext {
            env,
            invoker,
            shell,
            root: root.into(),
            scratch_dir: std::env::temp_dir(),
            cross: CrossSettings::default(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_cross(mut self, cross: CrossSettings) -> Self {
        self.cross = cross;
        self
    }

    /// The C compiler, `cc` when none was configured.
    pub fn cc(&self) -> String {
        match self.env.get("CC") {
            Some(cc) if !cc.is_empty() => cc.to_string(),
            _ => "cc".to_string(),
        }
    }

    /// Executable suffix of the target platform.
    pub fn binext(&self) -> String {
        self.env.get_or_empty("BINEXT").to_string()
    }

    pub fn log(&mut self) -> &mut ConfigLog {
        self.invoker.log()
    }

    /// Whether binaries built for the target can run on this host.
    pub fn can_run(&self) -> bool {
        let wrapped = matches!(&self.cross.execute, Some(w) if !w.trim().is_empty());
        wrapped || !self.cross.compiling
    }

    /// Command line that runs a compiled probe binary, or `None` when
    /// target binaries cannot run on this host.
    pub fn run_command(&self, binary: &Path) -> Result<Option<Vec<String>>> {
        if !self.can_run() {
            return Ok(None);
        }
        let binary = binary.display().to_string();
        match &self.cross.execute {
            Some(wrapper) if !wrapper.trim().is_empty() => {
                let mut argv = shell_words::split(wrapper)?;
                argv.push(binary);
                Ok(Some(argv))
            }
            _ => Ok(Some(vec![binary])),
        }
    }
}

/// Memoizing front end of the capability probes.
#[derive(Debug)]
pub struct Prober {
    ctx: ProbeContext,
    cache: ProbeCache,
    host: HostId,
}

impl Prober {
    pub fn new(ctx: ProbeContext, cache: ProbeCache, host: HostId) -> Self {
        Prober { ctx, cache, host }
    }

    pub fn env(&self) -> &EnvMap {
        &self.ctx.env
    }

    pub fn env_mut(&mut self) -> &mut EnvMap {
        &mut self.ctx.env
    }

    pub fn shell(&self) -> &Shell {
        &self.ctx.shell
    }

    /// The environment and the shell at once, for steps that update one
    /// while reporting through the other.
    pub fn env_and_shell(&mut self) -> (&mut EnvMap, &Shell) {
        (&mut self.ctx.env, &self.ctx.shell)
    }

    pub fn context(&self) -> &ProbeContext {
        &self.ctx
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// Append a line to the config log.
    pub fn log(&mut self, msg: impl AsRef<str>) {
        self.ctx.log().line(msg);
    }

    /// Take the prober apart, e.g. to flush the cache and close the log.
    pub fn into_parts(self) -> (ProbeContext, ProbeCache) {
        (self.ctx, self.cache)
    }

    fn memoized<F>(&mut self, kind: ProbeKind, name: &str, probe: F) -> Result<bool>
    where
        F: FnOnce(&mut ProbeContext) -> Result<bool>,
    {
        let key = ProbeKey::new(&self.host, kind, name);
        let ctx = &mut self.ctx;
        let memo = self.cache.memoize(key, || probe(ctx))?;

        if memo == Memo::Cached {
            self.ctx.shell.checking(format_args!("{} {}", kind.label(), name));
            self.ctx.shell.cached();
            self.ctx
                .log()
                .line(format!("{} {}: yes (cached)", kind, name));
        }
        Ok(memo.passed())
    }

    /// Compiler sanity check. Not cached; on success `CC` is set to `cc`.
    pub fn compiler(&mut self, cc: &str) -> Result<bool> {
        checks::compiler(&mut self.ctx, cc)
    }

    /// Is `header` usable? Sets `HAVE_<HEADER>`.
    pub fn header(&mut self, header: &str) -> Result<bool> {
        let found = self.memoized(ProbeKind::Header, header, |ctx| checks::header(ctx, header))?;
        self.ctx.env.have(header, found);
        Ok(found)
    }

    /// Does `-l<name>` link? Sets `HAVE_LIB<NAME>`.
    pub fn library(&mut self, name: &str, headers: &[String]) -> Result<bool> {
        let found = self.memoized(ProbeKind::Library, name, |ctx| {
            checks::library(ctx, name, headers)
        })?;
        self.ctx.env.have(&format!("lib{}", name), found);
        Ok(found)
    }

    /// Is `define` defined after including `headers`? Sets `HAVE_<DEFINE>`.
    pub fn define(&mut self, define: &str, headers: &[String], libs: &[String], run: bool) -> Result<bool> {
        let found = self.memoized(ProbeKind::Define, define, |ctx| {
            checks::define(ctx, define, headers, libs, run)
        })?;
        self.ctx.env.have(define, found);
        Ok(found)
    }

    /// Does the feature snippet at `source` compile (and run)? Sets
    /// `HAVE_<NAME>`.
    pub fn compile(&mut self, name: &str, source: &Path, libs: &[String]) -> Result<bool> {
        let found = self.memoized(ProbeKind::Compile, name, |ctx| {
            checks::compile(ctx, name, source, libs)
        })?;
        self.ctx.env.have(name, found);
        Ok(found)
    }

    /// Does `binary args..` exit 0? Sets `HAVE_<BINARY>`.
    pub fn binary(&mut self, binary: &str, args: &[String]) -> Result<bool> {
        let found = self.memoized(ProbeKind::Binary, binary, |ctx| {
            Ok(checks::binary(ctx, binary, args))
        })?;
        self.ctx.env.have(binary, found);
        Ok(found)
    }

    /// Does pkg-config know `package`? Sets `HAVE_<PACKAGE>`.
    pub fn pkg_config(&mut self, package: &str) -> Result<bool> {
        let found = self.memoized(ProbeKind::PkgConfig, package, |ctx| {
            Ok(checks::pkg_config(ctx, package))
        })?;
        self.ctx.env.have(package, found);
        Ok(found)
    }
}

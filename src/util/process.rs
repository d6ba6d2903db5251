//! Subprocess execution.
//!
//! [`Invoker`] is the only place external programs are started. Probes hand
//! it an argument vector and get back an exit code; the invoker writes the
//! command line, the child's output and the exit code to the config log
//! before the result is interpreted.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

use crate::util::log::ConfigLog;
use crate::util::shell::Shell;

/// Exit code reported when a program could not be started at all, or was
/// terminated by a signal.
pub const INVOCATION_FAILED: i32 = -1;

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command with no stdin and wait for completion, capturing
    /// stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Captured result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// An output with the given exit code and no captured text.
    pub fn with_code(code: i32) -> Self {
        ProcessOutput {
            code: Some(code),
            ..Default::default()
        }
    }
}

impl From<Output> for ProcessOutput {
    fn from(output: Output) -> Self {
        ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Spawns external programs.
///
/// `Err` means the program could not be started; a program that ran and
/// failed is an `Ok` with a nonzero code.
pub trait Executor {
    fn execute(&mut self, argv: &[String]) -> Result<ProcessOutput>;
}

/// Executor backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    cwd: Option<PathBuf>,
}

impl SystemExecutor {
    pub fn new() -> Self {
        SystemExecutor { cwd: None }
    }

    /// Run every child in `cwd`.
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        SystemExecutor {
            cwd: Some(cwd.into()),
        }
    }
}

impl Executor for SystemExecutor {
    fn execute(&mut self, argv: &[String]) -> Result<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .context("cannot execute an empty command")?;

        // Bare names go through PATH; anything with a separator is used as is.
        let resolved = if Path::new(program).components().count() > 1 {
            PathBuf::from(program)
        } else {
            find_executable(program)
                .with_context(|| format!("`{}` not found in PATH", program))?
        };

        let mut builder = ProcessBuilder::new(resolved).args(args);
        if let Some(ref cwd) = self.cwd {
            builder = builder.cwd(cwd);
        }
        Ok(builder.exec()?.into())
    }
}

/// Runs programs on behalf of probes and records everything in the log.
pub struct Invoker {
    executor: Box<dyn Executor>,
    log: ConfigLog,
}

impl Invoker {
    pub fn new(executor: Box<dyn Executor>, log: ConfigLog) -> Self {
        Invoker { executor, log }
    }

    /// Run `argv` and return its exit code, or [`INVOCATION_FAILED`].
    pub fn run(&mut self, argv: &[String]) -> i32 {
        self.log.line(format!("running: {}", argv.join(" ")));

        let code = match self.executor.execute(argv) {
            Ok(output) => {
                self.log.raw(&output.stdout);
                self.log.raw(&output.stderr);
                match output.code {
                    Some(code) => code,
                    None => {
                        self.log.line("terminated by signal");
                        INVOCATION_FAILED
                    }
                }
            }
            Err(e) => {
                self.log.line(format!("invocation failed: {:#}", e));
                INVOCATION_FAILED
            }
        };

        self.log.line(format!("exit code: {}", code));
        tracing::debug!("`{}` exited with {}", argv.join(" "), code);
        code
    }

    /// Run `argv`, echo `yes` on exit code 0 and `no` otherwise.
    pub fn test_call(&mut self, argv: &[String], shell: &Shell) -> bool {
        let code = self.run(argv);
        if code == 0 {
            self.log.line("ok");
            shell.result(true);
            true
        } else {
            self.log.line(format!("failed with exit code {}", code));
            shell.result(false);
            false
        }
    }

    /// The config log.
    pub fn log(&mut self) -> &mut ConfigLog {
        &mut self.log
    }

    /// Give back the log, e.g. to close it.
    pub fn into_log(self) -> ConfigLog {
        self.log
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker").field("log", &self.log).finish()
    }
}

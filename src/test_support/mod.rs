//! Test utilities and mocks for probeconf unit tests.
//!
//! The main piece is [`MockExecutor`], a scripted stand-in for the real
//! toolchain: tests register command patterns and canned outputs, and the
//! invoker runs against it exactly as it would against `cc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use probeconf::test_support::{prober_with, MockExecutor, MockProcessOutput};
//!
//! #[test]
//! fn test_example() {
//!     let mut exec = MockExecutor::new();
//!     exec.expect("pkg-config --version", MockProcessOutput::success("0.29.2"));
//!     let calls = exec.recorder();
//!
//!     let (mut prober, _) = prober_with(exec, tmp.path());
//!     // Probe, then inspect `calls`...
//! }
//! ```

pub mod fixtures;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::core::env::EnvMap;
use crate::probe::{HostId, ProbeCache, ProbeContext, Prober};
use crate::util::log::ConfigLog;
use crate::util::process::{Executor, Invoker, ProcessOutput};
use crate::util::shell::Shell;

pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

impl From<MockProcessOutput> for ProcessOutput {
    fn from(out: MockProcessOutput) -> Self {
        ProcessOutput {
            code: Some(out.status),
            stdout: out.stdout.into_bytes(),
            stderr: out.stderr.into_bytes(),
        }
    }
}

/// Pattern for matching commands in MockExecutor.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match using a regex pattern.
    Regex(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    pub pattern: CommandPattern,
    pub output: MockProcessOutput,
}

impl CommandExpectation {
    pub fn new(pattern: CommandPattern, output: MockProcessOutput) -> Self {
        CommandExpectation { pattern, output }
    }
}

/// Shared view of the commands a [`MockExecutor`] received.
///
/// Cloned out of the executor before it is boxed into an invoker, so tests
/// can still inspect the calls afterwards.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder(Rc<RefCell<Vec<String>>>);

impl CallRecorder {
    fn push(&self, cmd: String) {
        self.0.borrow_mut().push(cmd);
    }

    pub fn count(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn all(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.0.borrow().last().cloned()
    }

    /// Number of calls containing `needle`.
    pub fn matching(&self, needle: &str) -> usize {
        self.0.borrow().iter().filter(|c| c.contains(needle)).count()
    }
}

/// Mock process executor for testing command execution.
///
/// Commands are matched against expectations in registration order; the
/// first match wins. Unmatched commands get the default output,
/// or fail to "spawn" when no default is set.
#[derive(Debug, Default)]
pub struct MockExecutor {
    expectations: Vec<CommandExpectation>,
    calls: CallRecorder,
    default_output: Option<MockProcessOutput>,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&mut self, cmd: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Exact(cmd.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&mut self, prefix: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&mut self, substring: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command matching a regex.
    pub fn expect_regex(&mut self, pattern: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Regex(pattern.to_string()),
            output,
        ))
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&mut self, expectation: CommandExpectation) -> &mut Self {
        self.expectations.push(expectation);
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&mut self, output: MockProcessOutput) -> &mut Self {
        self.default_output = Some(output);
        self
    }

    /// Handle on the recorded calls that outlives the executor.
    pub fn recorder(&self) -> CallRecorder {
        self.calls.clone()
    }
}

impl Executor for MockExecutor {
    fn execute(&mut self, argv: &[String]) -> Result<ProcessOutput> {
        let full_cmd = argv.join(" ");
        self.calls.push(full_cmd.clone());

        if let Some(exp) = self.expectations.iter().find(|e| e.pattern.matches(&full_cmd)) {
            return Ok(exp.output.clone().into());
        }

        if let Some(ref default) = self.default_output {
            return Ok(default.clone().into());
        }

        bail!("unexpected command: {}", full_cmd)
    }
}

/// Build an owned argument vector.
pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Host identity used by all tests.
pub fn test_host() -> HostId {
    HostId::new("testhost")
}

/// A probe context rooted at `root`, with an in-memory log, a buffered
/// shell and scratch files under `<root>/scratch`.
pub fn context_with(exec: MockExecutor, root: &Path) -> ProbeContext {
    let scratch = scratch_dir(root);
    let invoker = Invoker::new(Box::new(exec), ConfigLog::memory());
    ProbeContext::new(EnvMap::new(), invoker, Shell::buffered(), root).with_scratch_dir(scratch)
}

/// A prober over [`context_with`], caching to `<root>/config.cache`.
/// Returns the scratch directory alongside.
pub fn prober_with(exec: MockExecutor, root: &Path) -> (Prober, PathBuf) {
    let ctx = context_with(exec, root);
    let scratch = ctx.scratch_dir.clone();
    let cache = ProbeCache::empty(root.join("config.cache"));
    (Prober::new(ctx, cache, test_host()), scratch)
}

fn scratch_dir(root: &Path) -> PathBuf {
    let dir = root.join("scratch");
    std::fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("creating {}: {}", dir.display(), e));
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_executor_patterns() {
        let mut exec = MockExecutor::new();
        exec.expect("gcc --version", MockProcessOutput::success("gcc 12.0.0"));
        exec.expect_prefix("clang", MockProcessOutput::success("clang 15"));
        exec.expect_regex(r"-l\w+$", MockProcessOutput::failure(1, "ld: not found"));

        let out = exec.execute(&argv(&["gcc", "--version"])).unwrap();
        assert_eq!(out.code, Some(0));
        assert_eq!(out.stdout, b"gcc 12.0.0");

        let out = exec.execute(&argv(&["clang", "-c", "x.c"])).unwrap();
        assert_eq!(out.code, Some(0));

        let out = exec.execute(&argv(&["cc", "x.c", "-lbsd"])).unwrap();
        assert_eq!(out.code, Some(1));

        assert!(exec.execute(&argv(&["unknown"])).is_err());
        assert_eq!(exec.recorder().count(), 4);
    }

    #[test]
    fn test_recorder_outlives_executor() {
        let mut exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        let calls = exec.recorder();

        let mut invoker = Invoker::new(Box::new(exec), ConfigLog::memory());
        invoker.run(&argv(&["cc", "-o", "a", "a.c"]));

        assert_eq!(calls.all(), vec!["cc -o a a.c".to_string()]);
        assert_eq!(calls.matching("a.c"), 1);
    }
}

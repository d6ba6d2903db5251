//! Operator-facing progress output.
//!
//! Configure output is line-oriented and meant for humans watching a build:
//!
//! ```text
//! checking header stdio.h... yes
//! checking library talloc... yes (cached)
//! checking define SO_REUSEPORT... no
//! ```
//!
//! A check is announced with [`Shell::checking`] and closed with
//! [`Shell::result`] or [`Shell::cached`]. The Shell never decides what a
//! result means; it only formats it.

use std::cell::RefCell;
use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no progress
    Quiet,
    /// Default: one line per check
    #[default]
    Normal,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

#[derive(Debug)]
enum Output {
    Stdout,
    Buffer(Vec<u8>),
}

/// Central shell for all operator output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
    out: RefCell<Output>,
}

impl Shell {
    /// Create a shell writing to stdout.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stdout().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
            out: RefCell::new(Output::Stdout),
        }
    }

    /// Create a shell from CLI flags.
    pub fn from_flags(quiet: bool, no_color: bool) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        };
        let color = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Shell::new(verbosity, color)
    }

    /// Create a shell that records output in memory, without colors.
    pub fn buffered() -> Self {
        Shell {
            verbosity: Verbosity::Normal,
            use_color: false,
            out: RefCell::new(Output::Buffer(Vec::new())),
        }
    }

    /// Everything written so far by a buffered shell.
    pub fn captured(&self) -> String {
        match &*self.out.borrow() {
            Output::Buffer(buf) => String::from_utf8_lossy(buf).into_owned(),
            Output::Stdout => String::new(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Announce a check: `checking <what>... `.
    pub fn checking(&self, what: impl Display) {
        self.progress(format_args!("checking {}... ", what));
    }

    /// Close a check with `yes` or `no`.
    pub fn result(&self, ok: bool) {
        if ok {
            self.progress(format_args!("{}\n", self.paint("yes", "\x1b[1;32m")));
        } else {
            self.progress(format_args!("{}\n", self.paint("no", "\x1b[1;33m")));
        }
    }

    /// Close a check answered from the cache.
    pub fn cached(&self) {
        self.progress(format_args!("{} (cached)\n", self.paint("yes", "\x1b[1;32m")));
    }

    /// Print a fragment without a newline.
    pub fn echo(&self, msg: impl Display) {
        self.progress(format_args!("{}", msg));
    }

    /// Print a full line.
    pub fn line(&self, msg: impl Display) {
        self.progress(format_args!("{}\n", msg));
    }

    /// Print an error line. Shown even in quiet mode.
    pub fn error(&self, msg: impl Display) {
        let prefix = self.paint("error", "\x1b[1;31m");
        self.write(format_args!("{}: {}\n", prefix, msg));
    }

    fn progress(&self, args: std::fmt::Arguments<'_>) {
        if self.is_quiet() {
            return;
        }
        self.write(args);
    }

    fn write(&self, args: std::fmt::Arguments<'_>) {
        match &mut *self.out.borrow_mut() {
            Output::Stdout => {
                let mut stdout = io::stdout().lock();
                let _ = stdout.write_fmt(args);
                let _ = stdout.flush();
            }
            Output::Buffer(buf) => {
                let _ = buf.write_fmt(args);
            }
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.use_color {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

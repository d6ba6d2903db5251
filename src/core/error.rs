//! Configuration error types.
//!
//! Only fatal conditions are errors. An optional check that fails is a
//! `HAVE_<NAME>=0` flag, never a `ConfigureError`.

use std::path::PathBuf;

use thiserror::Error;

/// Hint shown to the operator whenever a configuration run fails.
pub const SEE_LOG: &str = "see config.log for more details";

/// A condition that aborts the configuration run.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("platform `{0}` is not supported")]
    UnsupportedPlatform(String),

    #[error("please specify the MinGW installation path with --with-mingw=path")]
    MissingMingw,

    #[error("C compiler `{0}` cannot create executables")]
    CompilerUnusable(String),

    #[error("required header `{0}` not found")]
    RequiredHeader(String),

    #[error("required library `{0}` not found")]
    RequiredLibrary(String),

    #[error("required feature `{0}` not available")]
    RequiredCompile(String),

    #[error("no suitable {runtime} version could be found (tried {tried})")]
    NoRuntime { runtime: String, tried: String },

    #[error("configure cache {} is corrupt: {message}", path.display())]
    CacheCorrupt { path: PathBuf, message: String },

    #[error("{}:{line}: {message}", path.display())]
    Manifest {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to render {}: {message}", path.display())]
    Template { path: PathBuf, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfigureError {
    /// Whether this error comes from a failed required check, as opposed to
    /// a broken input file or an I/O problem.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            ConfigureError::UnsupportedPlatform(_)
                | ConfigureError::MissingMingw
                | ConfigureError::CompilerUnusable(_)
                | ConfigureError::RequiredHeader(_)
                | ConfigureError::RequiredLibrary(_)
                | ConfigureError::RequiredCompile(_)
                | ConfigureError::NoRuntime { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failure_classification() {
        assert!(ConfigureError::RequiredHeader("stdio.h".into()).is_check_failure());
        assert!(ConfigureError::MissingMingw.is_check_failure());
        assert!(!ConfigureError::CacheCorrupt {
            path: PathBuf::from("config.cache"),
            message: "eof".into(),
        }
        .is_check_failure());
    }

    #[test]
    fn test_messages() {
        let err = ConfigureError::NoRuntime {
            runtime: "lua".into(),
            tried: "lua5.3, lua".into(),
        };
        assert_eq!(
            err.to_string(),
            "no suitable lua version could be found (tried lua5.3, lua)"
        );

        let err = ConfigureError::Manifest {
            path: PathBuf::from("versions"),
            line: 3,
            message: "expected name=major.minor.patch".into(),
        };
        assert_eq!(err.to_string(), "versions:3: expected name=major.minor.patch");
    }
}

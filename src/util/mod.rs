//! Shared utilities

pub mod fs;
pub mod log;
pub mod process;
pub mod scratch;
pub mod shell;

pub use log::ConfigLog;
pub use process::{Executor, Invoker, SystemExecutor};
pub use shell::Shell;

//! configure - probe the toolchain and generate build configuration

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use probeconf::core::error::SEE_LOG;
use probeconf::ops::configure::{run as configure, Session};
use probeconf::util::shell::Shell;

mod cli;

use cli::Cli;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("probeconf=debug")
    } else {
        EnvFilter::new("probeconf=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let options = cli.options(&cwd);
    let shell = Shell::from_flags(cli.quiet, cli.no_color);

    let outcome = configure(&options, Session::system(&options, shell));
    match &outcome.result {
        Ok(_) => {
            outcome.shell.line("type \"make\" to build the software");
            Ok(true)
        }
        Err(e) => {
            outcome.shell.error(e);
            outcome.shell.line(format_args!("configure failed, {}", SEE_LOG));
            Ok(false)
        }
    }
}

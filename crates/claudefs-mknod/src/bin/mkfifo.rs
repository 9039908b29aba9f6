//! ClaudeFS fifo creation tool

use claudefs_mknod::cli::{self, MKFIFO_PROG};
use claudefs_mknod::mount::{self, ROOT_ENV};
use claudefs_mknod::MknodError;
use std::ffi::OsString;

fn run() -> anyhow::Result<i32> {
    let mut args: Vec<OsString> = std::env::args_os().collect();
    let target = mount::dispatch(&mut args, std::env::var_os(ROOT_ENV)).map_err(MknodError::from)?;

    let parsed = match cli::parse_mkfifo(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            e.print()?;
            return Ok(cli::clap_exit_code(&e));
        }
    };

    let fs = target.filesystem();
    let summary = cli::run_mkfifo(&parsed, &fs, &mut std::io::stderr())?;
    tracing::debug!(
        "{} created, {} failed",
        summary.succeeded,
        summary.failed
    );
    Ok(summary.exit_code())
}

fn main() {
    cli::init_logging();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", MKFIFO_PROG, e);
            1
        }
    };
    std::process::exit(code);
}

use std::process::ExitCode;

use clap::Parser;
use kernelfe::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Session log (overwrites the previous run's log)
    logger::init(args.verbose);
    if let Some(path) = logger::log_path() {
        log::debug!("logging to {}", path.display());
    }

    cli::run(args)
}

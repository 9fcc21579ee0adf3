//! `iceflow` - experiment configuration tool

use clap::Parser;

use iceflow::cli::args::Cli;
use iceflow::cli::commands;
use iceflow::error::ExitCode;
use iceflow::observability::init_logging;

fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    match commands::dispatch(cli) {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

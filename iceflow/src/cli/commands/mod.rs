//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod show;
pub mod step;
pub mod validate;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, LoaderOptions};
use crate::error::IceflowError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub fn dispatch(cli: Cli) -> Result<(), IceflowError> {
    let loader = ConfigLoader::new(LoaderOptions {
        expand_env: cli.expand_env,
        ..LoaderOptions::default()
    });

    match cli.command {
        Commands::Validate(args) => validate::run(&loader, &args),
        Commands::Show(args) => show::run(&loader, &args),
        Commands::Step(args) => step::run(&loader, &args, cli.quiet),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

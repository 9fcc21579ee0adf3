//! `step` command: persist training progress.

use crate::cli::args::StepArgs;
use crate::config::{ConfigLoader, record_global_step};
use crate::error::IceflowError;

/// Records the step given on the command line.
///
/// # Errors
///
/// Returns an error if the document fails to load, the step would rewind
/// without `--force`, or the file cannot be replaced.
pub fn run(loader: &ConfigLoader, args: &StepArgs, quiet: bool) -> Result<(), IceflowError> {
    let update = record_global_step(loader, &args.file, args.step, args.force)?;

    if !quiet {
        println!(
            "{}: global_step {} -> {}",
            args.file.display(),
            update.previous,
            update.current
        );
    }
    Ok(())
}

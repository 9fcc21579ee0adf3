//! `show` command: print the normalized configuration.

use crate::cli::args::{DocumentFormat, ShowArgs};
use crate::config::ConfigLoader;
use crate::error::IceflowError;

/// Loads a document and prints it with defaults materialized.
///
/// Load warnings go to the log; the document goes to stdout so it can be
/// piped into another file.
///
/// # Errors
///
/// Returns an error if the document fails to load or serialize.
pub fn run(loader: &ConfigLoader, args: &ShowArgs) -> Result<(), IceflowError> {
    let loaded = loader.load(&args.file)?;

    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let rendered = match args.format {
        DocumentFormat::Yaml => loaded.config.to_yaml()?,
        DocumentFormat::Json => serde_json::to_string_pretty(&*loaded.config)?,
    };
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

//! `validate` command: check experiment files without running anything.

use std::path::PathBuf;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, IceflowError};

/// Outcome for one file.
#[derive(Debug)]
struct FileReport {
    path: PathBuf,
    error: Option<ConfigError>,
    warnings: Vec<LoadWarning>,
    valid: bool,
}

/// Validates every file matched by the arguments and reports the results.
///
/// All files are checked even after a failure.
///
/// # Errors
///
/// Returns a usage error for a bad or empty glob pattern, and
/// `ValidationFailed` if any file is invalid (or has warnings under
/// `--strict`).
pub fn run(loader: &ConfigLoader, args: &ValidateArgs) -> Result<(), IceflowError> {
    let files = expand_patterns(&args.files)?;

    let reports: Vec<FileReport> = files
        .into_iter()
        .map(|path| check_file(loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => print_human(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(&reports))?),
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}

fn check_file(loader: &ConfigLoader, path: PathBuf, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating configuration");

    match loader.load(&path) {
        Ok(loaded) => {
            let valid = !strict || loaded.warnings.is_empty();
            FileReport {
                path,
                error: None,
                warnings: loaded.warnings,
                valid,
            }
        }
        Err(error) => FileReport {
            path,
            error: Some(error),
            warnings: Vec::new(),
            valid: false,
        },
    }
}

/// Expands glob patterns; plain paths pass through untouched so that a
/// missing file is reported per file rather than as a usage error.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, IceflowError> {
    let mut files = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }

        let entries = glob::glob(pattern)
            .map_err(|e| IceflowError::Usage(format!("invalid pattern '{pattern}': {e}")))?;

        let before = files.len();
        for entry in entries {
            files.push(entry.map_err(glob::GlobError::into_error)?);
        }
        if files.len() == before {
            return Err(IceflowError::Usage(format!(
                "pattern '{pattern}' matched no files"
            )));
        }
    }

    Ok(files)
}

fn print_human(reports: &[FileReport]) {
    for report in reports {
        let path = report.path.display();

        for warning in &report.warnings {
            tracing::warn!(
                file = %path,
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        match &report.error {
            None if report.valid => println!("{path}: ok"),
            None => eprintln!(
                "{path}: {} warning(s) treated as errors (--strict)",
                report.warnings.len()
            ),
            Some(ConfigError::ValidationError { errors, .. }) => {
                eprintln!("{path}: {} validation error(s)", errors.len());
                for issue in errors {
                    eprintln!("  {issue}");
                }
            }
            Some(error) => eprintln!("{path}: {error}"),
        }
    }

    let invalid = reports.iter().filter(|r| !r.valid).count();
    tracing::info!(
        total = reports.len(),
        valid = reports.len() - invalid,
        invalid,
        "validation finished"
    );
}

fn to_json(reports: &[FileReport]) -> serde_json::Value {
    let files: Vec<_> = reports
        .iter()
        .map(|r| {
            let warnings: Vec<_> = r
                .warnings
                .iter()
                .map(|w| serde_json::json!({ "message": w.message, "location": w.location }))
                .collect();
            serde_json::json!({
                "path": r.path.display().to_string(),
                "valid": r.valid,
                "error": r.error.as_ref().map(ToString::to_string),
                "warnings": warnings,
            })
        })
        .collect();

    let invalid = reports.iter().filter(|r| !r.valid).count();
    serde_json::json!({
        "files": files,
        "summary": {
            "total": reports.len(),
            "valid": reports.len() - invalid,
            "invalid": invalid,
        },
    })
}

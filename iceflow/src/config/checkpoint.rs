//! Persisting training progress back into the experiment document.
//!
//! The document is loaded and validated first. The write-back then edits
//! the tree parsed from the file as written, before any `${VAR}` expansion,
//! so only `global_step` changes. Comments of the original document are
//! not preserved.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_yaml::Value;
use tempfile::NamedTempFile;

use crate::config::loader::ConfigLoader;
use crate::error::{ConfigError, Result};

/// Outcome of a step write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepUpdate {
    /// Step recorded before the update
    pub previous: u64,
    /// Step recorded now
    pub current: u64,
}

/// Records `step` as the experiment's `global_step`.
///
/// Moving the step backwards is refused unless `force` is set.
///
/// # Errors
///
/// Returns an error if the document fails to load, the step would move
/// backwards without `force`, or the file cannot be replaced.
pub fn record_global_step(
    loader: &ConfigLoader,
    path: &Path,
    step: u64,
    force: bool,
) -> Result<StepUpdate> {
    let loaded = loader.load(path)?;
    let previous = loaded.config.global_step;

    if step < previous && !force {
        return Err(ConfigError::RangeError {
            field: "global_step".to_string(),
            value: step.to_string(),
            expected: format!("at least the recorded step {previous} (use --force to rewind)"),
        }
        .into());
    }

    let raw = fs::read_to_string(path)?;
    let rendered = with_global_step(&raw, path, step)?;

    let recorded = loader.load_from_str(&rendered)?.config.global_step;
    if recorded != step {
        return Err(ConfigError::RangeError {
            field: "global_step".to_string(),
            value: recorded.to_string(),
            expected: format!("{step} after write-back"),
        }
        .into());
    }

    replace_file(path, &rendered)?;

    tracing::info!(
        path = %path.display(),
        previous,
        current = step,
        "recorded global step"
    );

    Ok(StepUpdate {
        previous,
        current: step,
    })
}

/// Sets `global_step` in the unexpanded document and renders it.
fn with_global_step(raw: &str, path: &Path, step: u64) -> Result<String> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut root: Value = serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()),
        message: format!("cannot rewrite document: {e}"),
    })?;

    let Value::Mapping(map) = &mut root else {
        return Err(ConfigError::TypeError {
            field: "(root)".to_string(),
            expected: "a mapping".to_string(),
            found: "another YAML value".to_string(),
        }
        .into());
    };
    map.insert(Value::from("global_step"), Value::from(step));

    Ok(serde_yaml::to_string(&root)?)
}

/// Writes `contents` to a uniquely named sibling and renames it over `path`,
/// keeping the original permissions.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(contents.as_bytes())?;
    staging.as_file().sync_all()?;
    fs::set_permissions(staging.path(), fs::metadata(path)?.permissions())?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}

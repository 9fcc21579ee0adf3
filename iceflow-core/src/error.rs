//! Core error types for `iceflow`
//!
//! Configuration and validation error types shared across the workspace.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Classification
// ============================================================================

/// Broad class of a configuration failure.
///
/// Every [`ConfigError`] maps onto exactly one kind, which is what callers
/// (and tests) match on when the precise variant does not matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document is not well-formed YAML.
    Parse,
    /// A required field is absent.
    Schema,
    /// A value has the wrong kind.
    Type,
    /// A value violates a documented bound.
    Range,
    /// The document could not be read.
    Io,
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Required field is absent from the document
    #[error("missing required field '{field}'")]
    SchemaError {
        /// Dotted path of the missing field (e.g. `model.base.path`)
        field: String,
    },

    /// Field value has the wrong kind
    #[error("wrong type for '{field}': expected {expected}, found {found}")]
    TypeError {
        /// Dotted path of the field
        field: String,
        /// Description of the expected kind
        expected: String,
        /// Description of what the document contains
        found: String,
    },

    /// Field value violates a documented bound
    #[error("value out of range for '{field}': got {value}, expected {expected}")]
    RangeError {
        /// Dotted path of the field
        field: String,
        /// The offending value, rendered
        value: String,
        /// Description of the bound
        expected: String,
    },

    /// Cross-field validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exists but could not be read
    #[error("cannot read {path}: {source}")]
    ReadError {
        /// Path to the file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },

    /// One or more configuration files failed validation.
    #[error("{count} file(s) failed validation")]
    ValidationFailed {
        /// Number of files that failed validation.
        count: usize,
    },
}

impl ConfigError {
    /// Returns the broad class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError { .. } => ErrorKind::Parse,
            Self::SchemaError { .. } | Self::EnvVarNotSet { .. } => ErrorKind::Schema,
            Self::TypeError { .. } => ErrorKind::Type,
            Self::RangeError { .. } | Self::ValidationError { .. } | Self::ValidationFailed { .. } => {
                ErrorKind::Range
            }
            Self::MissingFile { .. } | Self::ReadError { .. } => ErrorKind::Io,
        }
    }

    /// Returns the dotted field path the error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::SchemaError { field }
            | Self::TypeError { field, .. }
            | Self::RangeError { field, .. } => Some(field),
            _ => None,
        }
    }
}

fn summarize(errors: &[ValidationIssue]) -> String {
    match errors {
        [] => "no issues recorded".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "train[2].weight_fe")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

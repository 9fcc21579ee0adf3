//! Experiment configuration loader
//!
//! This module implements the loading pipeline:
//! 1. Size check and UTF-8 decoding
//! 2. Environment variable expansion when enabled (pre-parse, on raw text,
//!    outside comments)
//! 3. YAML parsing
//! 4. Shape check: presence, kinds, bounds, scalar normalization
//! 5. Deserialization to typed config
//! 6. Cross-field validation
//! 7. Freeze with `Arc`

use crate::config::shape::{self, ShapeChecker};
use crate::config::validation::Validator;
use crate::error::ConfigError;

use iceflow_core::config::ExperimentConfig;
use serde_yaml::Value;
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Origin label used when a document does not come from a file.
const STRING_ORIGIN: &str = "<string>";

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,

    /// Expand `${VAR}` references before parsing. Off by default, so the
    /// loaded configuration depends on the document alone.
    pub expand_env: bool,
}

/// Limits for configuration size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of coupling layers.
    pub max_couplings: usize,

    /// Maximum number of training stages.
    pub max_train_stages: usize,

    /// Maximum configuration document size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_couplings: env_or("ICEFLOW_MAX_COUPLINGS", 256),
            max_train_stages: env_or("ICEFLOW_MAX_TRAIN_STAGES", 64),
            max_config_size: env_or("ICEFLOW_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration document.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<ExperimentConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
///
/// Handles the full loading pipeline from YAML text to a frozen
/// `ExperimentConfig`. The loader holds no per-document state and can be
/// reused for any number of documents.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Returns the options this loader was built with.
    #[must_use]
    pub const fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Loads a configuration file and returns the frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - YAML parsing fails
    /// - A required field is missing, mistyped or out of range
    /// - Cross-field validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;

        let file_size =
            usize::try_from(metadata.len()).unwrap_or(self.options.config_limits.max_config_size);
        self.check_size(file_size)?;

        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "file is not valid UTF-8".to_string(),
            },
            _ => read_error(path, e),
        })?;

        tracing::debug!(path = %path.display(), bytes = raw.len(), "loading configuration");
        self.load_text(&raw, path)
    }

    /// Loads a configuration from an in-memory document.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`], minus file access failures.
    pub fn load_from_str(&self, text: &str) -> Result<LoadResult, ConfigError> {
        self.check_size(text.len())?;
        self.load_text(text, Path::new(STRING_ORIGIN))
    }

    /// Loads a configuration from any reader.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the stream is not valid UTF-8 or cannot be
    /// read, otherwise the same errors as [`ConfigLoader::load_from_str`].
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<LoadResult, ConfigError> {
        let limit = u64::try_from(self.options.config_limits.max_config_size)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut text = String::new();
        reader
            .take(limit)
            .read_to_string(&mut text)
            .map_err(|e| ConfigError::ParseError {
                path: Path::new(STRING_ORIGIN).to_path_buf(),
                line: None,
                message: format!("failed to read configuration: {e}"),
            })?;
        self.load_from_str(&text)
    }

    fn check_size(&self, size: usize) -> Result<(), ConfigError> {
        let max = self.options.config_limits.max_config_size;
        if size > max {
            return Err(ConfigError::RangeError {
                field: "file_size".to_string(),
                value: format!("{size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }
        Ok(())
    }

    fn load_text(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        // Stage 1: Environment variable substitution (before YAML parsing)
        let text = if self.options.expand_env {
            let mut env_sub = EnvSubstitution::new();
            let substituted = env_sub.substitute(raw, origin)?;
            warnings.extend(env_sub.warnings);
            Cow::Owned(substituted)
        } else {
            Cow::Borrowed(raw)
        };

        // Stage 2: YAML parsing
        let mut root: Value = shape::parse_document(&text).map_err(|e| ConfigError::ParseError {
            path: origin.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: "Configuration file is empty".to_string(),
            });
        }

        // Stage 3: Shape check
        let mut checker = ShapeChecker::new();
        checker.check(&mut root)?;
        warnings.extend(checker.into_warnings());

        // Stage 4: Deserialize to typed config
        let config: ExperimentConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: format!("Failed to deserialize configuration: {e}"),
            })?;

        // Stage 5: Validation
        let mut validator = Validator::new();
        let validation_result = validator.validate(&config, &self.options.config_limits);

        if validation_result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: validation_result.errors,
            });
        }

        for issue in validation_result.warnings {
            warnings.push(LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            });
        }

        tracing::debug!(
            origin = %origin.display(),
            seed = config.seed,
            stages = config.train.len(),
            warnings = warnings.len(),
            "configuration loaded"
        );

        // Stage 6: Freeze
        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text BEFORE parsing so that expanded values go through
/// normal scalar resolution. Comment text is copied verbatim, so a
/// commented-out key never triggers a substitution error.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

enum Fallback<'a> {
    Warn,
    Default(&'a str),
    Required(&'a str),
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());

        for (idx, line) in raw_yaml.split_inclusive('\n').enumerate() {
            let (code, comment) = split_comment(line);
            self.expand(code, idx + 1, source_path, &mut result)?;
            result.push_str(comment);
        }

        Ok(result)
    }

    fn expand(
        &mut self,
        code: &str,
        line: usize,
        source_path: &Path,
        out: &mut String,
    ) -> Result<(), ConfigError> {
        let mut rest = code;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let Some(end) = body.find('}') else {
                    return Err(ConfigError::ParseError {
                        path: source_path.to_path_buf(),
                        line: Some(line),
                        message: "unclosed environment variable reference".to_string(),
                    });
                };
                self.resolve(&body[..end], line, source_path, out)?;
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);
        Ok(())
    }

    fn resolve(
        &mut self,
        spec: &str,
        line: usize,
        source_path: &Path,
        out: &mut String,
    ) -> Result<(), ConfigError> {
        let (name, fallback) = match spec.find(':') {
            Some(i) if spec[i + 1..].starts_with('-') => (&spec[..i], Fallback::Default(&spec[i + 2..])),
            Some(i) if spec[i + 1..].starts_with('?') => (&spec[..i], Fallback::Required(&spec[i + 2..])),
            _ => (spec, Fallback::Warn),
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::ParseError {
                path: source_path.to_path_buf(),
                line: Some(line),
                message: format!("invalid environment variable name '{name}'"),
            });
        }

        if let Ok(value) = std::env::var(name) {
            out.push_str(&value);
            return Ok(());
        }

        match fallback {
            Fallback::Default(default) => out.push_str(default),
            Fallback::Required(message) => {
                let location = if message.is_empty() {
                    format!("{} line {line}", source_path.display())
                } else {
                    format!("{} line {line}: {message}", source_path.display())
                };
                return Err(ConfigError::EnvVarNotSet {
                    var: name.to_string(),
                    location,
                });
            }
            Fallback::Warn => {
                self.warnings.push(LoadWarning {
                    message: format!("Environment variable '{name}' is not set, using empty string"),
                    location: Some(format!("{} line {line}", source_path.display())),
                });
            }
        }
        Ok(())
    }
}

/// Splits a line into its code part and its trailing comment.
///
/// A `#` starts a comment when it opens the line or follows whitespace and
/// is not inside a quoted scalar.
fn split_comment(line: &str) -> (&str, &str) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut after_space = true;

    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single && !escaped => in_double = !in_double,
            '#' if !in_single && !in_double && after_space => return line.split_at(i),
            _ => {}
        }
        escaped = in_double && c == '\\' && !escaped;
        after_space = c.is_whitespace();
    }

    (line, "")
}

fn read_error(path: &Path, error: std::io::Error) -> ConfigError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ConfigError::MissingFile {
            path: path.to_path_buf(),
        }
    } else {
        ConfigError::ReadError {
            path: path.to_path_buf(),
            source: error,
        }
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

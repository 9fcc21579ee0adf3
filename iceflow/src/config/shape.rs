//! Document shape checking
//!
//! Walks the parsed YAML tree against a declarative field table before the
//! tree is handed to serde. This is where the loader decides between the
//! three failure classes:
//!
//! - a required key that is missing (or explicitly `null`) is a schema error,
//! - a value of the wrong kind is a type error,
//! - a value outside its documented bound is a range error.
//!
//! The pass also normalizes scalars that YAML 1.2 reads as strings but
//! experiment files use as numbers or booleans: digit-grouped numerals such
//! as `10_000` and the YAML 1.1 booleans `yes`/`no`/`on`/`off`. Only
//! positions declared numeric or boolean are rewritten.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Number, Value};

use iceflow_core::config::EnergyErrorHandling;

use crate::config::loader::LoadWarning;
use crate::error::ConfigError;

// ============================================================================
// Field Tables
// ============================================================================

/// Numeric bound attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Any value representable by the field's type.
    Any,
    /// Zero or greater.
    NonNegative,
    /// Strictly greater than zero.
    Positive,
}

impl Bound {
    const fn describe_integer(self) -> &'static str {
        match self {
            Self::Any => "a 64-bit signed integer",
            Self::NonNegative => "a non-negative integer",
            Self::Positive => "a positive integer",
        }
    }

    const fn describe_real(self) -> &'static str {
        match self {
            Self::Any => "a finite real number",
            Self::NonNegative => "a non-negative finite real number",
            Self::Positive => "a positive finite real number",
        }
    }
}

/// Whether a key must appear, and whether `null` is meaningful for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present with a non-null value.
    Required,
    /// May be omitted; `null` is treated as omitted.
    Optional,
    /// May be omitted or `null`; both disable the setting.
    Nullable,
}

/// Expected kind of a field's value.
#[derive(Debug)]
pub enum Kind {
    Integer(Bound),
    Real(Bound),
    Bool,
    Text,
    Choice(&'static [&'static str]),
    Section(&'static [Field]),
    /// Ordered list of sections with at least `min_len` entries.
    SectionList {
        fields: &'static [Field],
        min_len: usize,
    },
}

/// One key of a mapping.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub presence: Presence,
}

const fn required(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Required,
    }
}

const fn optional(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Optional,
    }
}

const fn nullable(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Nullable,
    }
}

const COUNT: Kind = Kind::Integer(Bound::Positive);

const BLOCK: &[Field] = &[
    required("num_blocks", COUNT),
    required("num_heads", COUNT),
    required("num_channels", COUNT),
];

const COUPLING: &[Field] = &[
    optional("num_repetitions", COUNT),
    required("auxiliary_update", Kind::Section(BLOCK)),
    required("position_update", Kind::Section(BLOCK)),
    required("quaternion_update", Kind::Section(BLOCK)),
];

const FLOW: &[Field] = &[required(
    "couplings",
    Kind::SectionList {
        fields: COUPLING,
        min_len: 1,
    },
)];

const DATASET: &[Field] = &[
    required("path", Kind::Text),
    required("num_molecules", COUNT),
    required("temperature", Kind::Real(Bound::Positive)),
    required("ice_type", Kind::Text),
    required("water_type", Kind::Text),
    optional("num_samples", Kind::Integer(Bound::NonNegative)),
    nullable("recompute_forces", Kind::Bool),
    nullable("store_forces", Kind::Bool),
];

const BASE_DENSITY: &[Field] = &[required("rot_concentration", Kind::Real(Bound::Positive))];

const TARGET_DENSITY: &[Field] = &[nullable("cutoff_threshold", Kind::Real(Bound::Positive))];

const MODEL: &[Field] = &[
    nullable("pretrained_model_path", Kind::Text),
    optional("use_auxiliary", Kind::Bool),
    required("flow", Kind::Section(FLOW)),
    required("base", Kind::Section(DATASET)),
    required("target", Kind::Section(DATASET)),
    optional("base_density", Kind::Section(BASE_DENSITY)),
    optional("target_density", Kind::Section(TARGET_DENSITY)),
    optional(
        "energy_error_handling",
        Kind::Choice(EnergyErrorHandling::NAMES),
    ),
];

const REPORTING: &[Field] = &[
    nullable("num_samples", COUNT),
    optional("num_samples_per_batch", COUNT),
    optional("report_ess", Kind::Bool),
    optional("report_likelihood", Kind::Bool),
    optional("save_model", Kind::Bool),
    optional("save_samples", Kind::Bool),
    optional("save_statistics", Kind::Bool),
    optional("plot_oxygens", Kind::Bool),
    optional("plot_energy_histograms", Kind::Bool),
    nullable("plot_quaternions", Kind::Bool),
];

const TRAIN_STAGE: &[Field] = &[
    required("num_epochs", COUNT),
    required("num_iters_per_epoch", COUNT),
    required("num_samples", COUNT),
    required("init_learning_rate", Kind::Real(Bound::Positive)),
    required("target_learning_rate", Kind::Real(Bound::Positive)),
    required("weight_fe", Kind::Real(Bound::NonNegative)),
    required("weight_nll", Kind::Real(Bound::NonNegative)),
];

/// Field table of an experiment document root.
pub const EXPERIMENT: &[Field] = &[
    required("seed", Kind::Integer(Bound::Any)),
    optional("global_step", Kind::Integer(Bound::NonNegative)),
    optional("reporting", Kind::Section(REPORTING)),
    required("model", Kind::Section(MODEL)),
    required(
        "train",
        Kind::SectionList {
            fields: TRAIN_STAGE,
            min_len: 1,
        },
    ),
];

// ============================================================================
// Checker
// ============================================================================

/// Checks and normalizes a parsed document in place.
///
/// Stops at the first schema, type or range violation; fields are visited
/// in table order. Unknown keys never fail the check and are reported as
/// warnings instead.
#[derive(Debug, Default)]
pub struct ShapeChecker {
    warnings: Vec<LoadWarning>,
}

enum Slot {
    Missing,
    Null,
    Present,
}

impl ShapeChecker {
    /// Creates a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `root` against the experiment field table.
    ///
    /// # Errors
    ///
    /// Returns the first schema, type or range violation found.
    pub fn check(&mut self, root: &mut Value) -> Result<(), ConfigError> {
        self.check_section(root, EXPERIMENT, "")
    }

    /// Consumes the checker and returns the collected warnings.
    #[must_use]
    pub fn into_warnings(self) -> Vec<LoadWarning> {
        self.warnings
    }

    fn check_section(
        &mut self,
        value: &mut Value,
        fields: &[Field],
        path: &str,
    ) -> Result<(), ConfigError> {
        let Value::Mapping(map) = value else {
            return Err(type_error(path, "a mapping", value));
        };

        for field in fields {
            let key = Value::String(field.name.to_string());
            let field_path = join(path, field.name);

            let slot = match map.get(&key) {
                None => Slot::Missing,
                Some(Value::Null) => Slot::Null,
                Some(_) => Slot::Present,
            };

            match (slot, field.presence) {
                (Slot::Missing | Slot::Null, Presence::Required) => {
                    return Err(ConfigError::SchemaError { field: field_path });
                }
                (Slot::Null, Presence::Optional) => {
                    tracing::debug!(field = %field_path, "null optional field, using default");
                    map.remove(&key);
                }
                (Slot::Missing, _) | (Slot::Null, Presence::Nullable) => {}
                (Slot::Present, _) => {
                    if let Some(inner) = map.get_mut(&key) {
                        self.check_value(inner, &field.kind, &field_path)?;
                    }
                }
            }
        }

        self.warn_unknown_keys(map, fields, path);
        Ok(())
    }

    fn check_value(&mut self, value: &mut Value, kind: &Kind, path: &str) -> Result<(), ConfigError> {
        match kind {
            Kind::Integer(bound) => {
                let n = integer_of(value, path)?;
                *value = bounded_integer(n, *bound, path)?;
            }
            Kind::Real(bound) => {
                let x = real_of(value, path)?;
                check_real_bound(x, *bound, path)?;
                *value = Value::Number(Number::from(x));
            }
            Kind::Bool => {
                let b = bool_of(value, path)?;
                *value = Value::Bool(b);
            }
            Kind::Text => {
                if !value.is_string() {
                    return Err(type_error(path, "a string", value));
                }
            }
            Kind::Choice(names) => check_choice(value, names, path)?,
            Kind::Section(fields) => self.check_section(value, fields, path)?,
            Kind::SectionList { fields, min_len } => {
                let Value::Sequence(items) = value else {
                    return Err(type_error(path, "a list", value));
                };
                if items.len() < *min_len {
                    return Err(ConfigError::RangeError {
                        field: path.to_string(),
                        value: format!("{} entries", items.len()),
                        expected: format!("at least {min_len} entry"),
                    });
                }
                for (idx, item) in items.iter_mut().enumerate() {
                    self.check_section(item, fields, &format!("{path}[{idx}]"))?;
                }
            }
        }
        Ok(())
    }

    fn warn_unknown_keys(&mut self, map: &Mapping, fields: &[Field], path: &str) {
        for key in map.keys() {
            let Some(name) = key.as_str() else {
                self.warnings.push(LoadWarning {
                    message: format!("Ignoring non-string key {}", describe(key)),
                    location: Some(display_path(path).to_string()),
                });
                continue;
            };
            if fields.iter().any(|f| f.name == name) {
                continue;
            }
            let hint = suggest(name, fields.iter().map(|f| f.name))
                .map(|s| format!(" (did you mean '{s}'?)"))
                .unwrap_or_default();
            self.warnings.push(LoadWarning {
                message: format!("Unknown key '{name}' is ignored{hint}"),
                location: Some(join(path, name)),
            });
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Tag given to integer literals wider than 64 bits.
const WIDE_INTEGER_TAG: &str = "!wide_integer";

/// Upper bound on wide literals rewritten in one document.
const MAX_WIDE_LITERALS: usize = 256;

/// serde_yaml reports a literal that fits 128 bits but not 64 as an
/// "invalid type" error naming the literal.
static WIDE_INTEGER_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"integer `?(-?[0-9]+)`? as [iu]128").expect("valid regex"));

/// Parses a document into a YAML tree.
///
/// Integer literals too wide for 64 bits make serde_yaml fail the whole
/// parse. Each one is rewritten as a tagged string and the parse retried,
/// so the field walk can report it against the field it belongs to.
///
/// # Errors
///
/// Returns the parser error for malformed YAML.
pub fn parse_document(text: &str) -> Result<Value, serde_yaml::Error> {
    let mut text = Cow::Borrowed(text);
    let mut rewritten = 0;
    loop {
        match serde_yaml::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) if rewritten < MAX_WIDE_LITERALS => {
                let Some(patched) = tag_wide_integer(&text, &e) else {
                    return Err(e);
                };
                tracing::debug!(line = e.location().map(|l| l.line()), "tagging wide integer literal");
                text = Cow::Owned(patched);
                rewritten += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Rewrites the first unquoted occurrence of the literal named by `error`,
/// searching from the line the error points at, then from the top.
fn tag_wide_integer(text: &str, error: &serde_yaml::Error) -> Option<String> {
    let message = error.to_string();
    let literal = WIDE_INTEGER_ERROR.captures(&message)?.get(1)?.as_str();
    let digits = literal.trim_start_matches('-');

    let line = error.location().map_or(1, |l| l.line());
    let from = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum::<usize>();

    let standalone = |from: usize| {
        text[from..]
            .match_indices(digits)
            .map(|(i, _)| from + i)
            .find(|&i| is_standalone(text, i, i + digits.len()))
    };
    let found = standalone(from).or_else(|| standalone(0))?;

    let start = match text[..found].chars().next_back() {
        Some(c @ ('-' | '+')) => found - c.len_utf8(),
        _ => found,
    };
    let end = found + digits.len();
    Some(format!(
        "{}{WIDE_INTEGER_TAG} '{}'{}",
        &text[..start],
        &text[start..end],
        &text[end..]
    ))
}

fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start]
        .trim_end_matches(['-', '+'])
        .chars()
        .next_back();
    let after = text[end..].chars().next();
    let attached = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '\'' | '"' | '$');
    !before.is_some_and(attached) && !after.is_some_and(attached)
}

fn wide_literal(value: &Value) -> Option<&str> {
    match value {
        Value::Tagged(tagged) if tagged.tag == WIDE_INTEGER_TAG => tagged.value.as_str(),
        _ => None,
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// Digit-grouped integer, e.g. `10_000`. Plain digits parse as numbers
/// already; a quoted `"128"` stays a string and is rejected.
static GROUPED_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+(?:_[0-9]+)+$").expect("valid regex"));

/// Digit-grouped real, e.g. `1_000.5` or `2_5e-3`.
static GROUPED_REAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:[0-9]+(?:_[0-9]+)*(?:\.(?:[0-9]+(?:_[0-9]+)*)?)?|\.[0-9]+(?:_[0-9]+)*)(?:[eE][-+]?[0-9]+)?$")
        .expect("valid regex")
});

/// Parses a digit-grouped integer literal.
#[must_use]
pub fn parse_grouped_integer(text: &str) -> Option<i128> {
    let text = text.trim();
    if !GROUPED_INT.is_match(text) {
        return None;
    }
    text.replace('_', "").parse().ok()
}

/// Parses a digit-grouped real literal. At least one `_` is required.
#[must_use]
pub fn parse_grouped_real(text: &str) -> Option<f64> {
    let text = text.trim();
    if !text.contains('_') || !GROUPED_REAL.is_match(text) {
        return None;
    }
    text.replace('_', "").parse().ok()
}

/// Parses the YAML 1.1 boolean words that YAML 1.2 reads as strings.
#[must_use]
pub fn parse_legacy_bool(text: &str) -> Option<bool> {
    match text {
        "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Some(true),
        "no" | "No" | "NO" | "off" | "Off" | "OFF" => Some(false),
        _ => None,
    }
}

fn integer_of(value: &Value, path: &str) -> Result<i128, ConfigError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .ok_or_else(|| type_error(path, "an integer", value)),
        Value::String(s) => parse_grouped_integer(s).ok_or_else(|| type_error(path, "an integer", value)),
        _ => match wide_literal(value) {
            Some(literal) => Err(ConfigError::RangeError {
                field: path.to_string(),
                value: literal.to_string(),
                expected: "an integer that fits in 64 bits".to_string(),
            }),
            None => Err(type_error(path, "an integer", value)),
        },
    }
}

fn bounded_integer(n: i128, bound: Bound, path: &str) -> Result<Value, ConfigError> {
    let out_of_range = || ConfigError::RangeError {
        field: path.to_string(),
        value: n.to_string(),
        expected: bound.describe_integer().to_string(),
    };
    match bound {
        Bound::Any => i64::try_from(n)
            .map(|v| Value::Number(Number::from(v)))
            .map_err(|_| out_of_range()),
        Bound::NonNegative | Bound::Positive => {
            if bound == Bound::Positive && n == 0 {
                return Err(out_of_range());
            }
            u64::try_from(n)
                .map(|v| Value::Number(Number::from(v)))
                .map_err(|_| out_of_range())
        }
    }
}

fn real_of(value: &Value, path: &str) -> Result<f64, ConfigError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| type_error(path, "a real number", value)),
        Value::String(s) => parse_grouped_real(s).ok_or_else(|| type_error(path, "a real number", value)),
        _ => wide_literal(value)
            .and_then(|literal| literal.parse().ok())
            .ok_or_else(|| type_error(path, "a real number", value)),
    }
}

fn check_real_bound(x: f64, bound: Bound, path: &str) -> Result<(), ConfigError> {
    let ok = x.is_finite()
        && match bound {
            Bound::Any => true,
            Bound::NonNegative => x >= 0.0,
            Bound::Positive => x > 0.0,
        };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::RangeError {
            field: path.to_string(),
            value: x.to_string(),
            expected: bound.describe_real().to_string(),
        })
    }
}

fn bool_of(value: &Value, path: &str) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_legacy_bool(s).ok_or_else(|| type_error(path, "a boolean", value)),
        _ => Err(type_error(path, "a boolean", value)),
    }
}

fn check_choice(value: &Value, names: &[&str], path: &str) -> Result<(), ConfigError> {
    let expected = format!("one of {}", names.join(", "));
    let Some(s) = value.as_str() else {
        return Err(type_error(path, &expected, value));
    };
    if names.contains(&s) {
        return Ok(());
    }
    let hint = suggest(s, names.iter().copied())
        .map(|n| format!(" (did you mean '{n}'?)"))
        .unwrap_or_default();
    Err(ConfigError::TypeError {
        field: path.to_string(),
        expected,
        found: format!("'{s}'{hint}"),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "(root)" } else { path }
}

fn type_error(path: &str, expected: &str, found: &Value) -> ConfigError {
    ConfigError::TypeError {
        field: display_path(path).to_string(),
        expected: expected.to_string(),
        found: describe(found),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("a boolean ({b})"),
        Value::Number(n) if n.is_f64() => format!("a real number ({n})"),
        Value::Number(n) => format!("an integer ({n})"),
        Value::String(s) => format!("a string ('{s}')"),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(t) => match wide_literal(value) {
            Some(literal) => format!("an integer ({literal})"),
            None => format!("a value tagged {}", t.tag),
        },
    }
}

/// Closest candidate within Damerau-Levenshtein distance 3.
fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|c| (c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}

// ============================================================================
// Tests
// ============================================================================

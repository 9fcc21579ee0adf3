//! Tri-state presence for optional, nullable configuration fields.
//!
//! A YAML key can be missing, written as `null`, or carry a value. The
//! distinction survives loading so that re-serialization writes back what
//! the author wrote; both `Absent` and `Null` read as "disabled".

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Presence state of a nullable configuration field.
///
/// Use with `#[serde(default, skip_serializing_if = "Setting::is_absent")]`
/// so that a missing key deserializes to [`Setting::Absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting<T> {
    /// Key not present in the document.
    Absent,
    /// Key present with an explicit `null`.
    Null,
    /// Key present with a value.
    Value(T),
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Setting<T> {
    /// Returns `true` if the key was missing.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` if the key was an explicit `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if a value is present.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns the value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }

    /// Returns the value, or `default` when absent or null.
    #[must_use]
    pub fn value_or(self, default: T) -> T {
        match self {
            Self::Value(v) => v,
            Self::Absent | Self::Null => default,
        }
    }
}

impl<T> From<Option<T>> for Setting<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only called when the key exists; missing keys go through `Default`.
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Value(v) => serializer.serialize_some(v),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

//! Configuration module
//!
//! Handles loading, validation and write-back of experiment documents.
//! The typed schema itself lives in `iceflow-core`.

pub mod checkpoint;
pub mod loader;
pub mod shape;
pub mod validation;

pub use checkpoint::{StepUpdate, record_global_step};
pub use iceflow_core::config::*;
pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use validation::{ValidationResult, Validator};

//! Observability module
//!
//! Logging infrastructure for `iceflow` commands.

pub mod logging;

pub use logging::{LogFormat, init_logging};

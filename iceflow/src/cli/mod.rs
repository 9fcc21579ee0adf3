//! Command-line interface
//!
//! Argument definitions and command handlers for the `iceflow` binary.

pub mod args;
pub mod commands;

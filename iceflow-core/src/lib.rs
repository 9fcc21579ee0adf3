//! `iceflow` Core - experiment configuration schema
//!
//! This crate provides the typed configuration graph for normalizing-flow
//! ice experiments and the error types shared with the `iceflow` loader
//! and CLI.

pub mod config;
pub mod error;
